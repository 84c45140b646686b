//! Editor timeline: keyframes on absolute times with per-key easing.
//!
//! Unlike [`AnimationClip`], timeline keys live in milliseconds and each key
//! carries the easing used on the way to the next key. A timeline can be
//! exported to a clip once authoring is done.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::animation::{
    Animatable, AnimationClip, AnimationError, ClipOptions, KeyframeTrack, Property, TrackValue,
};
use crate::easing::Easing;

/// Pixels per second of timeline at zoom 1.
pub const PIXELS_PER_SECOND: f64 = 100.0;
pub const MIN_ZOOM: f64 = 0.1;
pub const MAX_ZOOM: f64 = 2.0;
/// Ten seconds.
pub const DEFAULT_DURATION: f64 = 10_000.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyframeId(u32);

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimelineKeyframe {
    pub id: KeyframeId,
    /// Milliseconds from the start of the timeline.
    pub time: f64,
    pub value: TrackValue,
    /// Easing towards the following key.
    #[serde(default)]
    pub easing: Easing,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimelineTrack {
    pub id: TrackId,
    pub name: String,
    pub property: Property,
    /// Sorted by time; keys sharing a time keep insertion order.
    keyframes: Vec<TimelineKeyframe>,
}

impl TimelineTrack {
    pub fn keyframes(&self) -> &[TimelineKeyframe] {
        &self.keyframes
    }

    fn keyframe_mut(&mut self, id: KeyframeId) -> Option<&mut TimelineKeyframe> {
        self.keyframes.iter_mut().find(|k| k.id == id)
    }

    fn sort(&mut self) {
        self.keyframes.sort_by(|a, b| a.time.total_cmp(&b.time));
    }

    /// Value at `time`: eased blend between the last key at or before `time`
    /// and the first key after it.
    pub fn value_at(&self, time: f64) -> Option<TrackValue> {
        let split = self.keyframes.partition_point(|k| k.time <= time);
        let prev = split.checked_sub(1).map(|i| &self.keyframes[i]);
        let next = self.keyframes.get(split);

        match (prev, next) {
            (None, None) => None,
            (None, Some(next)) => Some(next.value.clone()),
            (Some(prev), None) => Some(prev.value.clone()),
            (Some(prev), Some(next)) => {
                let span = next.time - prev.time;
                let t = ((time - prev.time) / span) as f32;
                Some(prev.value.interpolate(&next.value, prev.easing.apply(t)))
            }
        }
    }
}

/// Timeline document that cannot be loaded.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TimelineError {
    #[error("timeline duration must be a finite number of milliseconds > 0, got {0}")]
    InvalidDuration(f64),
    #[error("track {track:?} key {key:?} has a non-finite time or value")]
    InvalidKeyframe { track: TrackId, key: KeyframeId },
    #[error("track id {0:?} is used more than once")]
    DuplicateTrack(TrackId),
    #[error("keyframe id {0:?} is used more than once")]
    DuplicateKeyframe(KeyframeId),
}

/// Serialized timeline as read from disk, before validation.
#[derive(Deserialize)]
#[serde(default)]
struct TimelineDef {
    duration: f64,
    current_time: f64,
    zoom: f64,
    tracks: Vec<TimelineTrack>,
}

impl Default for TimelineDef {
    fn default() -> Self {
        Self {
            duration: DEFAULT_DURATION,
            current_time: 0.0,
            zoom: 1.0,
            tracks: Vec::new(),
        }
    }
}

impl TryFrom<TimelineDef> for Timeline {
    type Error = TimelineError;

    /// Clamps and sorts keys into the duration and restarts id allocation
    /// after the largest id in use.
    fn try_from(def: TimelineDef) -> Result<Self, Self::Error> {
        if !(def.duration.is_finite() && def.duration > 0.0) {
            return Err(TimelineError::InvalidDuration(def.duration));
        }
        let mut track_ids = HashSet::new();
        let mut key_ids = HashSet::new();
        let mut max_id = 0;
        let mut tracks = def.tracks;
        for track in &mut tracks {
            if !track_ids.insert(track.id) {
                return Err(TimelineError::DuplicateTrack(track.id));
            }
            max_id = max_id.max(track.id.0);
            for key in &mut track.keyframes {
                if !(key.time.is_finite() && key.value.is_finite()) {
                    return Err(TimelineError::InvalidKeyframe {
                        track: track.id,
                        key: key.id,
                    });
                }
                if !key_ids.insert(key.id) {
                    return Err(TimelineError::DuplicateKeyframe(key.id));
                }
                max_id = max_id.max(key.id.0);
                key.time = key.time.clamp(0.0, def.duration);
            }
            track.sort();
        }

        let current_time = if def.current_time.is_finite() {
            def.current_time.clamp(0.0, def.duration)
        } else {
            0.0
        };
        let zoom = if def.zoom.is_finite() {
            def.zoom.clamp(MIN_ZOOM, MAX_ZOOM)
        } else {
            1.0
        };
        Ok(Self {
            duration: def.duration,
            current_time,
            zoom,
            playing: false,
            tracks,
            next_id: max_id.wrapping_add(1).max(1),
        })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TimelineDef")]
pub struct Timeline {
    duration: f64,
    current_time: f64,
    zoom: f64,
    #[serde(skip)]
    playing: bool,
    tracks: Vec<TimelineTrack>,
    #[serde(skip)]
    next_id: u32,
}

impl Default for Timeline {
    fn default() -> Self {
        Self::new(DEFAULT_DURATION)
    }
}

impl Timeline {
    pub fn new(duration_ms: f64) -> Self {
        let duration = if duration_ms.is_finite() && duration_ms > 0.0 {
            duration_ms
        } else {
            log::warn!("timeline: invalid duration {duration_ms}, using {DEFAULT_DURATION}");
            DEFAULT_DURATION
        };
        Self {
            duration,
            current_time: 0.0,
            zoom: 1.0,
            playing: false,
            tracks: Vec::new(),
            next_id: 1,
        }
    }

    fn allocate_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1).max(1);
        id
    }

    /// Add a track for the property at `name` (e.g. `"position.x"`).
    pub fn add_track(&mut self, name: &str) -> TrackId {
        let id = TrackId(self.allocate_id());
        self.tracks.push(TimelineTrack {
            id,
            name: name.to_string(),
            property: Property::parse(name),
            keyframes: Vec::new(),
        });
        id
    }

    pub fn remove_track(&mut self, id: TrackId) -> bool {
        let before = self.tracks.len();
        self.tracks.retain(|t| t.id != id);
        self.tracks.len() != before
    }

    pub fn track(&self, id: TrackId) -> Option<&TimelineTrack> {
        self.tracks.iter().find(|t| t.id == id)
    }

    fn track_mut(&mut self, id: TrackId) -> Option<&mut TimelineTrack> {
        self.tracks.iter_mut().find(|t| t.id == id)
    }

    pub fn tracks(&self) -> &[TimelineTrack] {
        &self.tracks
    }

    fn clamp_time(&self, time: f64) -> f64 {
        time.clamp(0.0, self.duration)
    }

    /// Add a linear key at `time` (clamped into the timeline).
    ///
    /// Non-finite values are refused.
    pub fn add_keyframe(
        &mut self,
        track: TrackId,
        time: f64,
        value: impl Into<TrackValue>,
    ) -> Option<KeyframeId> {
        let value = value.into();
        if !value.is_finite() {
            log::warn!("timeline: refusing non-finite keyframe value {value:?}");
            return None;
        }
        if time.is_nan() || self.track(track).is_none() {
            return None;
        }
        let time = self.clamp_time(time);
        let id = KeyframeId(self.allocate_id());
        let track = self.track_mut(track)?;
        track.keyframes.push(TimelineKeyframe {
            id,
            time,
            value,
            easing: Easing::Linear,
        });
        track.sort();
        Some(id)
    }

    pub fn set_keyframe_time(&mut self, track: TrackId, key: KeyframeId, time: f64) -> bool {
        if time.is_nan() {
            return false;
        }
        let time = self.clamp_time(time);
        let Some(track) = self.track_mut(track) else {
            return false;
        };
        let Some(keyframe) = track.keyframe_mut(key) else {
            return false;
        };
        keyframe.time = time;
        track.sort();
        true
    }

    pub fn set_keyframe_easing(&mut self, track: TrackId, key: KeyframeId, easing: Easing) -> bool {
        match self.track_mut(track).and_then(|t| t.keyframe_mut(key)) {
            Some(keyframe) => {
                keyframe.easing = easing;
                true
            }
            None => false,
        }
    }

    pub fn set_keyframe_value(
        &mut self,
        track: TrackId,
        key: KeyframeId,
        value: impl Into<TrackValue>,
    ) -> bool {
        let value = value.into();
        if !value.is_finite() {
            log::warn!("timeline: refusing non-finite keyframe value {value:?}");
            return false;
        }
        match self.track_mut(track).and_then(|t| t.keyframe_mut(key)) {
            Some(keyframe) => {
                keyframe.value = value;
                true
            }
            None => false,
        }
    }

    pub fn remove_keyframe(&mut self, track: TrackId, key: KeyframeId) -> bool {
        let Some(track) = self.track_mut(track) else {
            return false;
        };
        let before = track.keyframes.len();
        track.keyframes.retain(|k| k.id != key);
        track.keyframes.len() != before
    }

    pub fn track_value(&self, track: TrackId, time: f64) -> Option<TrackValue> {
        self.track(track)?.value_at(time)
    }

    pub fn seek(&mut self, time: f64) {
        if time.is_finite() {
            self.current_time = self.clamp_time(time);
        }
    }

    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// Change the length. The playhead and keys past the new end are pulled back to it.
    pub fn set_duration(&mut self, duration_ms: f64) {
        if !(duration_ms.is_finite() && duration_ms > 0.0) {
            log::warn!("timeline: ignoring invalid duration {duration_ms}");
            return;
        }
        self.duration = duration_ms;
        self.current_time = self.current_time.min(duration_ms);
        for track in &mut self.tracks {
            for key in &mut track.keyframes {
                key.time = key.time.min(duration_ms);
            }
            track.sort();
        }
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn set_zoom(&mut self, zoom: f64) {
        if zoom.is_finite() {
            self.zoom = zoom.clamp(MIN_ZOOM, MAX_ZOOM);
        }
    }

    pub fn play(&mut self) {
        self.playing = true;
    }

    pub fn pause(&mut self) {
        self.playing = false;
    }

    /// Pause and rewind to the start.
    pub fn stop(&mut self) {
        self.playing = false;
        self.current_time = 0.0;
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Advance the playhead by `dt` seconds while playing, wrapping at the end.
    pub fn tick(&mut self, dt: f32) {
        if !self.playing || !dt.is_finite() || dt < 0.0 {
            return;
        }
        self.current_time = (self.current_time + f64::from(dt) * 1000.0) % self.duration;
    }

    /// Write every track's value at the playhead into `target`.
    pub fn apply(&self, target: &mut dyn Animatable) {
        for track in &self.tracks {
            if let Some(value) = track.value_at(self.current_time) {
                target.apply(&track.property, &value);
            }
        }
    }

    pub fn time_to_x(&self, time: f64) -> f64 {
        time / 1000.0 * PIXELS_PER_SECOND * self.zoom
    }

    pub fn x_to_time(&self, x: f64) -> f64 {
        x / (PIXELS_PER_SECOND * self.zoom) * 1000.0
    }

    /// Export as a runtime clip lasting the timeline's duration.
    ///
    /// Key times become percentages. Per-key easing does not survive; the
    /// clip uses `options.easing` throughout. Tracks without keys are skipped.
    pub fn to_clip(
        &self,
        name: &str,
        options: ClipOptions,
    ) -> Result<AnimationClip, AnimationError> {
        let tracks = self
            .tracks
            .iter()
            .filter(|t| !t.keyframes.is_empty())
            .map(|t| {
                let keys = t.keyframes.iter().map(|k| {
                    let percent = (k.time / self.duration * 100.0) as f32;
                    (percent.clamp(0.0, 100.0), k.value.clone())
                });
                KeyframeTrack::with_property(t.property.clone(), keys)
            })
            .collect::<Result<Vec<_>, _>>()?;
        AnimationClip::new(name, tracks, options.with_duration(self.duration))
    }
}

/// `MM:SS.mmm`; negative times format as zero.
pub fn format_time(ms: f64) -> String {
    let total = if ms.is_finite() { ms.max(0.0) as u64 } else { 0 };
    let minutes = total / 60_000;
    let seconds = (total % 60_000) / 1000;
    let millis = total % 1000;
    format!("{minutes:02}:{seconds:02}.{millis:03}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::GameObject;

    fn number(v: Option<TrackValue>) -> f32 {
        v.and_then(|v| v.as_number()).unwrap()
    }

    #[test]
    fn value_between_keys_uses_previous_easing() {
        let mut tl = Timeline::new(2000.0);
        let track = tl.add_track("position.x");
        let first = tl.add_keyframe(track, 0.0, 0.0).unwrap();
        tl.add_keyframe(track, 1000.0, 100.0).unwrap();

        assert!((number(tl.track_value(track, 500.0)) - 50.0).abs() < 1e-4);

        assert!(tl.set_keyframe_easing(track, first, Easing::InQuad));
        assert!((number(tl.track_value(track, 500.0)) - 25.0).abs() < 1e-4);
    }

    #[test]
    fn value_outside_keys_holds_nearest() {
        let mut tl = Timeline::new(2000.0);
        let track = tl.add_track("opacity");
        assert_eq!(tl.track_value(track, 0.0), None);

        tl.add_keyframe(track, 500.0, 0.2);
        tl.add_keyframe(track, 1500.0, 0.8);
        assert_eq!(number(tl.track_value(track, 100.0)), 0.2);
        assert_eq!(number(tl.track_value(track, 1500.0)), 0.8);
        assert_eq!(number(tl.track_value(track, 1999.0)), 0.8);
    }

    #[test]
    fn keyframe_times_are_clamped() {
        let mut tl = Timeline::new(1000.0);
        let track = tl.add_track("x");
        let key = tl.add_keyframe(track, 5000.0, 1.0).unwrap();
        assert_eq!(tl.track(track).unwrap().keyframes()[0].time, 1000.0);

        assert!(tl.set_keyframe_time(track, key, -20.0));
        assert_eq!(tl.track(track).unwrap().keyframes()[0].time, 0.0);
        assert!(tl.add_keyframe(TrackId(999), 0.0, 1.0).is_none());
    }

    #[test]
    fn moving_a_key_resorts_the_track() {
        let mut tl = Timeline::new(1000.0);
        let track = tl.add_track("x");
        let a = tl.add_keyframe(track, 100.0, 1.0).unwrap();
        tl.add_keyframe(track, 500.0, 2.0).unwrap();
        tl.set_keyframe_time(track, a, 900.0);
        let ids: Vec<KeyframeId> =
            tl.track(track).unwrap().keyframes().iter().map(|k| k.id).collect();
        assert_eq!(ids.last(), Some(&a));
        assert!(tl.remove_keyframe(track, a));
        assert!(!tl.remove_keyframe(track, a));
    }

    #[test]
    fn apply_writes_playhead_values() {
        let mut tl = Timeline::new(1000.0);
        let x = tl.add_track("x");
        tl.add_keyframe(x, 0.0, 0.0);
        tl.add_keyframe(x, 1000.0, 10.0);
        let tint = tl.add_track("color");
        tl.add_keyframe(tint, 0.0, "#000000");
        tl.add_keyframe(tint, 1000.0, "#ffffff");

        tl.seek(500.0);
        let mut obj = GameObject::new("o");
        tl.apply(&mut obj);
        assert!((obj.position.x - 5.0).abs() < 1e-4);
        assert_eq!(obj.color.to_hex(), "#808080");
    }

    #[test]
    fn playhead_wraps_while_playing() {
        let mut tl = Timeline::new(1000.0);
        tl.tick(0.5);
        assert_eq!(tl.current_time(), 0.0);
        tl.play();
        tl.tick(0.75);
        tl.tick(0.5);
        assert!((tl.current_time() - 250.0).abs() < 1e-6);
        tl.stop();
        assert_eq!(tl.current_time(), 0.0);
    }

    #[test]
    fn pixel_conversions_follow_zoom() {
        let mut tl = Timeline::new(1000.0);
        assert_eq!(tl.time_to_x(1500.0), 150.0);
        tl.set_zoom(2.0);
        assert_eq!(tl.time_to_x(1500.0), 300.0);
        assert_eq!(tl.x_to_time(300.0), 1500.0);
        tl.set_zoom(50.0);
        assert_eq!(tl.zoom(), MAX_ZOOM);
    }

    #[test]
    fn formats_minutes_seconds_millis() {
        assert_eq!(format_time(0.0), "00:00.000");
        assert_eq!(format_time(61_234.0), "01:01.234");
        assert_eq!(format_time(-5.0), "00:00.000");
    }

    #[test]
    fn exports_to_clip() {
        let mut tl = Timeline::new(2000.0);
        let x = tl.add_track("x");
        tl.add_keyframe(x, 0.0, 0.0);
        tl.add_keyframe(x, 500.0, 10.0);
        tl.add_track("unused");

        let clip = tl.to_clip("authored", ClipOptions::default()).unwrap();
        assert_eq!(clip.duration(), 2000.0);
        assert_eq!(clip.tracks().len(), 1);
        let percents: Vec<f32> =
            clip.tracks()[0].keyframes().iter().map(|k| k.percent).collect();
        assert_eq!(percents, vec![0.0, 25.0]);
    }

    #[test]
    fn exporting_coincident_keys_fails() {
        let mut tl = Timeline::new(1000.0);
        let x = tl.add_track("x");
        tl.add_keyframe(x, 200.0, 0.0);
        tl.add_keyframe(x, 200.0, 1.0);
        assert!(matches!(
            tl.to_clip("dup", ClipOptions::default()),
            Err(AnimationError::DuplicateKeyTime { .. })
        ));
    }

    #[test]
    fn serde_round_trip_keeps_tracks() {
        let mut tl = Timeline::new(1000.0);
        let x = tl.add_track("x");
        let key = tl.add_keyframe(x, 100.0, 3.0).unwrap();
        tl.set_keyframe_easing(x, key, Easing::OutCubic);

        let json = serde_json::to_string(&tl).unwrap();
        let back: Timeline = serde_json::from_str(&json).unwrap();
        assert_eq!(back, tl);
        assert_eq!(back.track(x).unwrap().keyframes()[0].easing, Easing::OutCubic);
    }

    #[test]
    fn non_finite_values_are_refused() {
        let mut tl = Timeline::new(1000.0);
        let x = tl.add_track("x");
        assert!(tl.add_keyframe(x, 0.0, f32::NAN).is_none());
        let key = tl.add_keyframe(x, 0.0, 1.0).unwrap();
        assert!(!tl.set_keyframe_value(x, key, f32::INFINITY));
        assert!(!tl.set_keyframe_value(x, key, vec![0.0, f32::NAN]));
        assert_eq!(number(tl.track_value(x, 0.0)), 1.0);
    }

    #[test]
    fn loading_resorts_keys_and_resumes_ids() {
        let json = r#"{
            "duration": 2000.0,
            "current_time": 5000.0,
            "tracks": [{
                "id": 1,
                "name": "x",
                "property": "x",
                "keyframes": [
                    { "id": 3, "time": 1000.0, "value": 10.0 },
                    { "id": 2, "time": 0.0, "value": 0.0 },
                    { "id": 7, "time": 9000.0, "value": 20.0 }
                ]
            }]
        }"#;
        let mut tl: Timeline = serde_json::from_str(json).unwrap();
        let x = TrackId(1);

        assert!((number(tl.track_value(x, 500.0)) - 5.0).abs() < 1e-4);
        let times: Vec<f64> = tl.track(x).unwrap().keyframes().iter().map(|k| k.time).collect();
        assert_eq!(times, vec![0.0, 1000.0, 2000.0]);
        assert_eq!(tl.current_time(), 2000.0);

        let fresh = tl.add_keyframe(x, 1500.0, 15.0).unwrap();
        assert_eq!(fresh, KeyframeId(8));
        assert_eq!(tl.add_track("y"), TrackId(9));
    }

    #[test]
    fn loading_rejects_broken_documents() {
        assert!(serde_json::from_str::<Timeline>(r#"{ "duration": 0.0 }"#).is_err());
        assert!(serde_json::from_str::<Timeline>(r#"{ "duration": -5.0 }"#).is_err());

        let duplicate_keys = r#"{ "tracks": [{ "id": 1, "name": "x", "property": "x",
            "keyframes": [{ "id": 2, "time": 0.0, "value": 0.0 },
                          { "id": 2, "time": 10.0, "value": 1.0 }] }] }"#;
        assert!(serde_json::from_str::<Timeline>(duplicate_keys).is_err());

        let tl: Timeline = serde_json::from_str("{}").unwrap();
        assert_eq!(tl.duration(), DEFAULT_DURATION);
    }
}
