use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::property::Animatable;
use super::track::KeyframeTrack;
use super::value::TrackValue;
use super::AnimationError;
use crate::easing::Easing;

/// Playback settings baked into a clip.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClipOptions {
    /// Milliseconds.
    pub duration: f64,
    pub easing: Easing,
    /// Milliseconds before the first frame is written.
    pub delay: f64,
    #[serde(rename = "loop")]
    pub looping: bool,
    pub alternate: bool,
}

impl Default for ClipOptions {
    fn default() -> Self {
        Self {
            duration: 1000.0,
            easing: Easing::Linear,
            delay: 0.0,
            looping: false,
            alternate: false,
        }
    }
}

impl ClipOptions {
    #[must_use]
    pub fn with_duration(mut self, duration_ms: f64) -> Self {
        self.duration = duration_ms;
        self
    }

    #[must_use]
    pub fn with_easing(mut self, easing: Easing) -> Self {
        self.easing = easing;
        self
    }

    /// Unknown names fall back to linear.
    #[must_use]
    pub fn with_easing_name(mut self, name: &str) -> Self {
        self.easing = Easing::from_name(name);
        self
    }

    #[must_use]
    pub fn with_delay(mut self, delay_ms: f64) -> Self {
        self.delay = delay_ms;
        self
    }

    #[must_use]
    pub fn with_loop(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    #[must_use]
    pub fn with_alternate(mut self, alternate: bool) -> Self {
        self.alternate = alternate;
        self
    }

    fn validate(&self) -> Result<(), AnimationError> {
        if !(self.duration.is_finite() && self.duration > 0.0) {
            return Err(AnimationError::InvalidDuration(self.duration));
        }
        if !(self.delay.is_finite() && self.delay >= 0.0) {
            return Err(AnimationError::InvalidDelay(self.delay));
        }
        Ok(())
    }
}

/// A named, validated set of keyframe tracks. Immutable once built.
#[derive(Clone, Debug, PartialEq)]
pub struct AnimationClip {
    name: String,
    tracks: Vec<KeyframeTrack>,
    options: ClipOptions,
}

impl AnimationClip {
    pub fn new(
        name: impl Into<String>,
        tracks: Vec<KeyframeTrack>,
        options: ClipOptions,
    ) -> Result<Self, AnimationError> {
        options.validate()?;
        Ok(Self {
            name: name.into(),
            tracks,
            options,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tracks(&self) -> &[KeyframeTrack] {
        &self.tracks
    }

    pub fn options(&self) -> &ClipOptions {
        &self.options
    }

    pub fn duration(&self) -> f64 {
        self.options.duration
    }

    pub fn easing(&self) -> Easing {
        self.options.easing
    }

    pub fn delay(&self) -> f64 {
        self.options.delay
    }

    pub fn is_looping(&self) -> bool {
        self.options.looping
    }

    pub fn is_alternate(&self) -> bool {
        self.options.alternate
    }

    /// Sample every track at `progress` and write the values into `target`.
    pub fn apply(&self, progress: f32, target: &mut dyn Animatable) {
        for track in &self.tracks {
            track.apply(progress, target);
        }
    }

    pub fn to_def(&self) -> ClipDef {
        let keyframes = self
            .tracks
            .iter()
            .map(|track| {
                let keys = track
                    .keyframes()
                    .iter()
                    .map(|k| (format_label(k.percent), k.value.clone()))
                    .collect();
                (track.property().path().to_string(), keys)
            })
            .collect();
        ClipDef {
            name: self.name.clone(),
            keyframes,
            duration: self.options.duration,
            easing: self.options.easing.name().to_string(),
            delay: self.options.delay,
            looping: self.options.looping,
            alternate: self.options.alternate,
        }
    }
}

/// JSON form of a clip: property paths mapped to `{"<percent>": value}` tables.
///
/// ```json
/// { "name": "fadeIn", "keyframes": { "opacity": { "0": 0, "100%": 1 } }, "duration": 500 }
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClipDef {
    pub name: String,
    pub keyframes: BTreeMap<String, BTreeMap<String, TrackValue>>,
    pub duration: f64,
    pub easing: String,
    pub delay: f64,
    #[serde(rename = "loop")]
    pub looping: bool,
    pub alternate: bool,
}

impl Default for ClipDef {
    fn default() -> Self {
        let options = ClipOptions::default();
        Self {
            name: String::new(),
            keyframes: BTreeMap::new(),
            duration: options.duration,
            easing: options.easing.name().to_string(),
            delay: options.delay,
            looping: options.looping,
            alternate: options.alternate,
        }
    }
}

impl TryFrom<ClipDef> for AnimationClip {
    type Error = AnimationError;

    fn try_from(def: ClipDef) -> Result<Self, Self::Error> {
        let mut tracks = Vec::with_capacity(def.keyframes.len());
        for (path, keys) in def.keyframes {
            let mut parsed = Vec::with_capacity(keys.len());
            for (label, value) in keys {
                let percent = parse_label(&label).ok_or_else(|| AnimationError::InvalidKeyLabel {
                    property: path.clone(),
                    label: label.clone(),
                })?;
                parsed.push((percent, value));
            }
            tracks.push(KeyframeTrack::new(&path, parsed)?);
        }
        let options = ClipOptions {
            duration: def.duration,
            easing: Easing::from_name(&def.easing),
            delay: def.delay,
            looping: def.looping,
            alternate: def.alternate,
        };
        AnimationClip::new(def.name, tracks, options)
    }
}

fn parse_label(label: &str) -> Option<f32> {
    let trimmed = label.trim();
    let number = trimmed.strip_suffix('%').unwrap_or(trimmed).trim();
    number.parse::<f32>().ok()
}

fn format_label(percent: f32) -> String {
    if percent.fract() == 0.0 {
        format!("{}", percent as i32)
    } else {
        percent.to_string()
    }
}
