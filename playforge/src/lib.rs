//! Playforge - the simulation core behind the playforge 2D editor.
//!
//! AABB physics with a quadtree broad phase, keyframe animation with easing,
//! the editor timeline, and a scene host that runs them together and saves
//! the simulation state as JSON.

pub mod animation;
pub mod easing;
pub mod events;
pub mod math;
pub mod physics;
pub mod scene;
pub mod spatial;
pub mod timeline;
pub mod world;

pub use crate::animation::{
    Animatable, AnimationClip, AnimationError, AnimationEvent, AnimationRuntime, AnimationTargets,
    ClipDef, ClipOptions, InstanceId, KeyframeTrack, PlayOptions, Property, Rgb, TrackValue,
};
pub use crate::easing::Easing;
pub use crate::events::{EventBus, HandlerError, NamedEvent, SubscriptionId};
pub use crate::math::{Rect, Vec2};
pub use crate::physics::{
    BodyId, PhysicsConfig, PhysicsError, PhysicsEvent, PhysicsWorld, RigidBody2D,
};
pub use crate::scene::{Scene, SceneAction, SceneConfig, SceneSnapshot};
pub use crate::spatial::QuadTree;
pub use crate::timeline::{format_time, KeyframeId, Timeline, TimelineError, TrackId};
pub use crate::world::{EntityId, GameObject, World};
