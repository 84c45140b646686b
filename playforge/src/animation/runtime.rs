use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use super::clip::AnimationClip;
use super::property::AnimationTargets;
use crate::events::{EventBus, HandlerError, NamedEvent, SubscriptionId};
use crate::world::EntityId;

/// Handle to a running animation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(u64);

impl InstanceId {
    pub fn to_u64(self) -> u64 {
        self.0
    }
}

/// Per-play overrides of the clip's own settings.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayOptions {
    /// Milliseconds; `None` uses the clip delay.
    pub delay: Option<f64>,
    /// Playback rate multiplier.
    pub speed: f32,
    /// Milliseconds; `None` uses the clip duration.
    pub duration: Option<f64>,
}

impl Default for PlayOptions {
    fn default() -> Self {
        Self {
            delay: None,
            speed: 1.0,
            duration: None,
        }
    }
}

impl PlayOptions {
    #[must_use]
    pub fn with_delay(mut self, delay_ms: f64) -> Self {
        self.delay = Some(delay_ms);
        self
    }

    #[must_use]
    pub fn with_speed(mut self, speed: f32) -> Self {
        self.speed = speed;
        self
    }

    #[must_use]
    pub fn with_duration(mut self, duration_ms: f64) -> Self {
        self.duration = Some(duration_ms);
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlaybackState {
    Playing,
    Paused,
}

/// One playback of a clip on one target.
#[derive(Clone, Debug)]
pub struct AnimationInstance {
    id: InstanceId,
    target: EntityId,
    clip: Rc<AnimationClip>,
    start_time: f64,
    current_time: f64,
    progress: f32,
    state: PlaybackState,
    direction: i8,
    iteration: u32,
    speed: f32,
    duration: f64,
}

impl AnimationInstance {
    pub fn id(&self) -> InstanceId {
        self.id
    }

    pub fn target(&self) -> EntityId {
        self.target
    }

    pub fn clip(&self) -> &Rc<AnimationClip> {
        &self.clip
    }

    pub fn name(&self) -> &str {
        self.clip.name()
    }

    /// Runtime clock value (ms) at which the current period started.
    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    /// Milliseconds into the current period, negative while delayed.
    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    /// Eased progress last written to the target.
    pub fn progress(&self) -> f32 {
        self.progress
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    /// `1` forwards, `-1` backwards.
    pub fn direction(&self) -> i8 {
        self.direction
    }

    /// Completed loop periods.
    pub fn iteration(&self) -> u32 {
        self.iteration
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    /// Effective duration in milliseconds.
    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// Progress sampled for a raw period fraction, after direction and easing.
    fn sample_progress(&self, raw: f64) -> f32 {
        let t = raw.clamp(0.0, 1.0) as f32;
        let t = if self.direction < 0 { 1.0 - t } else { t };
        self.clip.easing().apply(t)
    }
}

/// Animation lifecycle notifications.
///
/// Serialized as flat records, e.g.
/// `{"event": "animationLooped", "name": "spin", "instance": 3, "iteration": 2}`.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum AnimationEvent {
    AnimationCreated {
        name: String,
    },
    AnimationStarted {
        name: String,
        target: EntityId,
        instance: InstanceId,
    },
    AnimationPaused {
        name: String,
        instance: InstanceId,
    },
    AnimationResumed {
        name: String,
        instance: InstanceId,
    },
    AnimationStopped {
        name: String,
        instance: InstanceId,
    },
    AnimationUpdated {
        name: String,
        instance: InstanceId,
        progress: f32,
    },
    AnimationLooped {
        name: String,
        instance: InstanceId,
        iteration: u32,
    },
    AnimationCompleted {
        name: String,
        instance: InstanceId,
    },
    AnimationRemoved {
        name: String,
    },
    AnimationsCleared,
}

impl NamedEvent for AnimationEvent {
    fn name(&self) -> &'static str {
        match self {
            AnimationEvent::AnimationCreated { .. } => "animationCreated",
            AnimationEvent::AnimationStarted { .. } => "animationStarted",
            AnimationEvent::AnimationPaused { .. } => "animationPaused",
            AnimationEvent::AnimationResumed { .. } => "animationResumed",
            AnimationEvent::AnimationStopped { .. } => "animationStopped",
            AnimationEvent::AnimationUpdated { .. } => "animationUpdated",
            AnimationEvent::AnimationLooped { .. } => "animationLooped",
            AnimationEvent::AnimationCompleted { .. } => "animationCompleted",
            AnimationEvent::AnimationRemoved { .. } => "animationRemoved",
            AnimationEvent::AnimationsCleared => "animationsCleared",
        }
    }
}

/// What a single instance did during `advance`.
enum Outcome {
    Delayed,
    Running,
    Looped,
    Completed,
}

/// Clip registry and playback clock.
///
/// The clock runs in milliseconds and only moves in [`AnimationRuntime::advance`].
/// Targets are looked up on every frame through [`AnimationTargets`]; an
/// instance whose target has gone away is stopped.
pub struct AnimationRuntime {
    clips: HashMap<String, Rc<AnimationClip>>,
    instances: BTreeMap<InstanceId, AnimationInstance>,
    next_instance: u64,
    clock: f64,
    events: EventBus<AnimationEvent>,
}

impl Default for AnimationRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl AnimationRuntime {
    pub fn new() -> Self {
        Self {
            clips: HashMap::new(),
            instances: BTreeMap::new(),
            next_instance: 1,
            clock: 0.0,
            events: EventBus::new(),
        }
    }

    /// Register a clip, replacing any clip with the same name. Running
    /// instances keep the clip they started with.
    pub fn create_animation(&mut self, clip: AnimationClip) -> Rc<AnimationClip> {
        let clip = Rc::new(clip);
        let name = clip.name().to_string();
        if self.clips.insert(name.clone(), Rc::clone(&clip)).is_some() {
            log::debug!("animation: replaced clip `{name}`");
        }
        self.events.publish(AnimationEvent::AnimationCreated { name });
        clip
    }

    pub fn animation(&self, name: &str) -> Option<&Rc<AnimationClip>> {
        self.clips.get(name)
    }

    pub fn animation_names(&self) -> impl Iterator<Item = &str> {
        self.clips.keys().map(String::as_str)
    }

    /// Unregister a clip after stopping every instance playing it.
    pub fn remove_animation(&mut self, name: &str) -> bool {
        if !self.clips.contains_key(name) {
            return false;
        }
        let playing: Vec<InstanceId> = self
            .instances
            .values()
            .filter(|inst| inst.clip.name() == name)
            .map(|inst| inst.id)
            .collect();
        for id in playing {
            self.stop(id);
        }
        self.clips.remove(name);
        self.events.publish(AnimationEvent::AnimationRemoved {
            name: name.to_string(),
        });
        true
    }

    /// Stop every instance and drop every clip.
    pub fn clear(&mut self) {
        let ids: Vec<InstanceId> = self.instances.keys().copied().collect();
        for id in ids {
            self.stop(id);
        }
        self.clips.clear();
        self.events.publish(AnimationEvent::AnimationsCleared);
    }

    /// Start `name` on `target`. Unknown clips are logged and yield `None`.
    pub fn play(
        &mut self,
        target: EntityId,
        name: &str,
        options: PlayOptions,
    ) -> Option<InstanceId> {
        let Some(clip) = self.clips.get(name).cloned() else {
            log::warn!("animation: no clip named `{name}`");
            return None;
        };

        let speed = if options.speed.is_finite() && options.speed > 0.0 {
            options.speed
        } else {
            log::warn!("animation: invalid speed {} for `{name}`, using 1", options.speed);
            1.0
        };
        let delay = match options.delay {
            Some(d) if d.is_finite() && d >= 0.0 => d,
            Some(d) => {
                log::warn!("animation: invalid delay {d} for `{name}`, using clip delay");
                clip.delay()
            }
            None => clip.delay(),
        };
        let duration = match options.duration {
            Some(d) if d.is_finite() && d > 0.0 => d,
            Some(d) => {
                log::warn!("animation: invalid duration {d} for `{name}`, using clip duration");
                clip.duration()
            }
            None => clip.duration(),
        };

        let id = InstanceId(self.next_instance);
        self.next_instance += 1;
        let instance = AnimationInstance {
            id,
            target,
            clip,
            start_time: self.clock + delay,
            current_time: -delay * f64::from(speed),
            progress: 0.0,
            state: PlaybackState::Playing,
            direction: 1,
            iteration: 0,
            speed,
            duration,
        };
        self.instances.insert(id, instance);
        self.events.publish(AnimationEvent::AnimationStarted {
            name: name.to_string(),
            target,
            instance: id,
        });
        Some(id)
    }

    pub fn pause(&mut self, id: InstanceId) -> bool {
        let Some(inst) = self.instances.get_mut(&id) else {
            return false;
        };
        if inst.state != PlaybackState::Playing {
            return false;
        }
        inst.state = PlaybackState::Paused;
        let name = inst.clip.name().to_string();
        self.events
            .publish(AnimationEvent::AnimationPaused { name, instance: id });
        true
    }

    /// Continue a paused instance from where it stopped.
    pub fn resume(&mut self, id: InstanceId) -> bool {
        let Some(inst) = self.instances.get_mut(&id) else {
            return false;
        };
        if inst.state != PlaybackState::Paused {
            return false;
        }
        inst.state = PlaybackState::Playing;
        inst.start_time = self.clock - inst.current_time / f64::from(inst.speed);
        let name = inst.clip.name().to_string();
        self.events
            .publish(AnimationEvent::AnimationResumed { name, instance: id });
        true
    }

    pub fn stop(&mut self, id: InstanceId) -> bool {
        match self.instances.remove(&id) {
            Some(inst) => {
                self.events.publish(AnimationEvent::AnimationStopped {
                    name: inst.clip.name().to_string(),
                    instance: id,
                });
                true
            }
            None => false,
        }
    }

    /// Stop every instance animating `target`. Returns how many were stopped.
    pub fn stop_target(&mut self, target: EntityId) -> usize {
        let ids: Vec<InstanceId> = self
            .instances
            .values()
            .filter(|inst| inst.target == target)
            .map(|inst| inst.id)
            .collect();
        for id in &ids {
            self.stop(*id);
        }
        ids.len()
    }

    pub fn instance(&self, id: InstanceId) -> Option<&AnimationInstance> {
        self.instances.get(&id)
    }

    pub fn instances(&self) -> impl Iterator<Item = &AnimationInstance> {
        self.instances.values()
    }

    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    /// Milliseconds advanced so far.
    pub fn clock(&self) -> f64 {
        self.clock
    }

    pub fn on_event<F>(&mut self, handler: F) -> SubscriptionId
    where
        F: FnMut(&AnimationEvent) -> anyhow::Result<()> + 'static,
    {
        self.events.subscribe(handler)
    }

    pub fn off_event(&mut self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    /// Drain animation events collected since the last call.
    ///
    /// `animationUpdated` is queued every frame per instance; hosts that only
    /// use handlers should turn retention off through [`Self::events_mut`].
    pub fn drain_events(&mut self) -> Vec<AnimationEvent> {
        self.events.drain()
    }

    pub fn handler_errors(&self) -> crossbeam_channel::Receiver<HandlerError> {
        self.events.errors()
    }

    pub fn events_mut(&mut self) -> &mut EventBus<AnimationEvent> {
        &mut self.events
    }

    /// Move the clock forward by `dt` seconds and write every playing
    /// instance's sample into its target.
    pub fn advance(&mut self, dt: f32, targets: &mut dyn AnimationTargets) {
        if !dt.is_finite() || dt < 0.0 {
            log::warn!("animation: ignoring advance with invalid dt {dt}");
            return;
        }
        self.clock += f64::from(dt) * 1000.0;

        let ids: Vec<InstanceId> = self
            .instances
            .values()
            .filter(|inst| inst.is_playing())
            .map(|inst| inst.id)
            .collect();

        for id in ids {
            self.advance_instance(id, targets);
        }
    }

    fn advance_instance(&mut self, id: InstanceId, targets: &mut dyn AnimationTargets) {
        let clock = self.clock;
        let Some(inst) = self.instances.get_mut(&id) else {
            return;
        };

        let Some(target) = targets.animatable_mut(inst.target) else {
            log::debug!(
                "animation: target {:?} of `{}` is gone, stopping",
                inst.target,
                inst.clip.name()
            );
            self.stop(id);
            return;
        };

        let speed = f64::from(inst.speed);
        let elapsed = (clock - inst.start_time) * speed;
        inst.current_time = elapsed;

        let outcome = if elapsed < 0.0 {
            Outcome::Delayed
        } else {
            let raw = elapsed / inst.duration;
            if raw < 1.0 {
                inst.progress = inst.sample_progress(raw);
                Outcome::Running
            } else if inst.clip.is_looping() {
                let periods = raw.floor();
                inst.iteration = inst.iteration.saturating_add(periods as u32);
                inst.start_time += periods * inst.duration / speed;
                inst.current_time = elapsed - periods * inst.duration;
                if inst.clip.is_alternate() && periods % 2.0 == 1.0 {
                    inst.direction = -inst.direction;
                }
                inst.progress = inst.sample_progress(raw - periods);
                Outcome::Looped
            } else {
                inst.current_time = inst.duration;
                inst.progress = inst.sample_progress(1.0);
                Outcome::Completed
            }
        };

        if matches!(outcome, Outcome::Delayed) {
            return;
        }

        inst.clip.apply(inst.progress, target);

        let name = inst.clip.name().to_string();
        let progress = inst.progress;
        let iteration = inst.iteration;

        match outcome {
            Outcome::Looped => {
                self.events.publish(AnimationEvent::AnimationLooped {
                    name: name.clone(),
                    instance: id,
                    iteration,
                });
            }
            Outcome::Completed => {
                self.instances.remove(&id);
            }
            Outcome::Delayed | Outcome::Running => {}
        }

        self.events.publish(AnimationEvent::AnimationUpdated {
            name: name.clone(),
            instance: id,
            progress,
        });

        if matches!(outcome, Outcome::Completed) {
            log::debug!("animation: `{name}` finished on instance {id:?}");
            self.events
                .publish(AnimationEvent::AnimationCompleted { name, instance: id });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::{ClipOptions, KeyframeTrack};
    use crate::easing::Easing;
    use crate::world::{GameObject, World};

    fn fade_in() -> AnimationClip {
        let track = KeyframeTrack::new("opacity", [(0.0, 0.0), (100.0, 1.0)]).unwrap();
        AnimationClip::new("fadeIn", vec![track], ClipOptions::default()).unwrap()
    }

    fn slide(options: ClipOptions) -> AnimationClip {
        let track = KeyframeTrack::new("x", [(0.0, 0.0), (100.0, 100.0)]).unwrap();
        AnimationClip::new("slide", vec![track], options).unwrap()
    }

    fn setup() -> (AnimationRuntime, World, EntityId) {
        let mut world = World::new();
        let id = world.spawn(GameObject::new("sprite").with_opacity(0.0));
        (AnimationRuntime::new(), world, id)
    }

    fn completed(events: &[AnimationEvent]) -> usize {
        events
            .iter()
            .filter(|e| matches!(e, AnimationEvent::AnimationCompleted { .. }))
            .count()
    }

    #[test]
    fn fade_in_reaches_halfway_then_completes_once() {
        let (mut rt, mut world, target) = setup();
        rt.create_animation(fade_in());
        let inst = rt
            .play(target, "fadeIn", PlayOptions::default().with_duration(1000.0))
            .unwrap();

        rt.advance(0.5, &mut world);
        assert!((world.get(target).unwrap().opacity - 0.5).abs() < 1e-4);
        assert!(rt.instance(inst).is_some());

        rt.advance(0.6, &mut world);
        assert_eq!(world.get(target).unwrap().opacity, 1.0);
        assert!(rt.instance(inst).is_none());

        rt.advance(0.5, &mut world);
        assert_eq!(completed(&rt.drain_events()), 1);
    }

    #[test]
    fn unknown_clip_yields_none() {
        let (mut rt, _world, target) = setup();
        assert!(rt.play(target, "missing", PlayOptions::default()).is_none());
    }

    #[test]
    fn advance_zero_is_idempotent() {
        let (mut rt, mut world, target) = setup();
        rt.create_animation(slide(ClipOptions::default().with_easing(Easing::InOutCubic)));
        rt.play(target, "slide", PlayOptions::default());
        rt.advance(0.37, &mut world);

        rt.advance(0.0, &mut world);
        let first = world.get(target).unwrap().clone();
        rt.advance(0.0, &mut world);
        assert_eq!(world.get(target).unwrap(), &first);
    }

    #[test]
    fn looping_counts_whole_periods() {
        let (mut rt, mut world, target) = setup();
        rt.create_animation(slide(ClipOptions::default().with_loop(true)));
        let inst = rt.play(target, "slide", PlayOptions::default()).unwrap();

        for _ in 0..3 {
            rt.advance(1.0, &mut world);
        }
        rt.advance(0.25, &mut world);

        let state = rt.instance(inst).unwrap();
        assert_eq!(state.iteration(), 3);
        assert!((state.current_time() - 250.0).abs() < 1e-6);
        assert!((world.get(target).unwrap().position.x - 25.0).abs() < 1e-3);
    }

    #[test]
    fn large_step_wraps_several_periods() {
        let (mut rt, mut world, target) = setup();
        rt.create_animation(slide(ClipOptions::default().with_loop(true)));
        let inst = rt.play(target, "slide", PlayOptions::default()).unwrap();

        rt.advance(4.5, &mut world);
        let state = rt.instance(inst).unwrap();
        assert_eq!(state.iteration(), 4);
        assert!((state.current_time() - 500.0).abs() < 1e-6);
        assert!((world.get(target).unwrap().position.x - 50.0).abs() < 1e-3);
    }

    #[test]
    fn alternate_plays_backwards_on_odd_periods() {
        let (mut rt, mut world, target) = setup();
        rt.create_animation(slide(ClipOptions::default().with_loop(true).with_alternate(true)));
        let inst = rt.play(target, "slide", PlayOptions::default()).unwrap();

        rt.advance(1.25, &mut world);
        assert_eq!(rt.instance(inst).unwrap().direction(), -1);
        assert!((world.get(target).unwrap().position.x - 75.0).abs() < 1e-3);

        rt.advance(1.0, &mut world);
        assert_eq!(rt.instance(inst).unwrap().direction(), 1);
        assert!((world.get(target).unwrap().position.x - 25.0).abs() < 1e-3);
    }

    #[test]
    fn pause_and_resume_preserve_progress() {
        let (mut rt, mut world, target) = setup();
        rt.create_animation(slide(ClipOptions::default()));
        let inst = rt.play(target, "slide", PlayOptions::default()).unwrap();

        rt.advance(0.3, &mut world);
        assert!(rt.pause(inst));
        assert!(!rt.pause(inst));
        rt.advance(5.0, &mut world);
        assert!((world.get(target).unwrap().position.x - 30.0).abs() < 1e-3);

        assert!(rt.resume(inst));
        rt.advance(0.2, &mut world);
        assert!((world.get(target).unwrap().position.x - 50.0).abs() < 1e-3);
    }

    #[test]
    fn delay_holds_the_target_untouched() {
        let (mut rt, mut world, target) = setup();
        world.get_mut(target).unwrap().position.x = -7.0;
        rt.create_animation(slide(ClipOptions::default().with_delay(500.0)));
        rt.play(target, "slide", PlayOptions::default());

        rt.advance(0.4, &mut world);
        assert_eq!(world.get(target).unwrap().position.x, -7.0);

        rt.advance(0.2, &mut world);
        assert!((world.get(target).unwrap().position.x - 10.0).abs() < 1e-3);
    }

    #[test]
    fn speed_scales_elapsed_time() {
        let (mut rt, mut world, target) = setup();
        rt.create_animation(slide(ClipOptions::default()));
        rt.play(target, "slide", PlayOptions::default().with_speed(2.0));
        rt.advance(0.25, &mut world);
        assert!((world.get(target).unwrap().position.x - 50.0).abs() < 1e-3);
    }

    #[test]
    fn vanished_target_stops_instance() {
        let (mut rt, mut world, target) = setup();
        rt.create_animation(fade_in());
        let inst = rt.play(target, "fadeIn", PlayOptions::default()).unwrap();
        world.despawn(target);

        rt.advance(0.1, &mut world);
        assert!(rt.instance(inst).is_none());
        assert!(rt
            .drain_events()
            .iter()
            .any(|e| matches!(e, AnimationEvent::AnimationStopped { .. })));
    }

    #[test]
    fn removing_a_clip_stops_its_instances() {
        let (mut rt, mut world, target) = setup();
        rt.create_animation(fade_in());
        let inst = rt.play(target, "fadeIn", PlayOptions::default()).unwrap();
        assert!(rt.remove_animation("fadeIn"));
        assert!(!rt.remove_animation("fadeIn"));
        assert!(rt.instance(inst).is_none());

        rt.advance(0.5, &mut world);
        assert_eq!(world.get(target).unwrap().opacity, 0.0);
    }

    #[test]
    fn lifecycle_events_in_order() {
        let (mut rt, mut world, target) = setup();
        rt.create_animation(fade_in());
        let inst = rt.play(target, "fadeIn", PlayOptions::default()).unwrap();
        rt.pause(inst);
        rt.resume(inst);
        rt.advance(2.0, &mut world);
        rt.clear();

        let names: Vec<&str> = rt.drain_events().iter().map(|e| e.name()).collect();
        assert_eq!(
            names,
            vec![
                "animationCreated",
                "animationStarted",
                "animationPaused",
                "animationResumed",
                "animationUpdated",
                "animationCompleted",
                "animationsCleared",
            ]
        );
    }

    #[test]
    fn looped_event_record() {
        let record = AnimationEvent::AnimationLooped {
            name: "spin".into(),
            instance: InstanceId(3),
            iteration: 2,
        }
        .to_record()
        .unwrap();
        assert_eq!(
            record,
            serde_json::json!({
                "event": "animationLooped",
                "name": "spin",
                "instance": 3,
                "iteration": 2
            })
        );
    }
}
