//! Keyframe animation: values, tracks, clips and the runtime that plays them.

mod clip;
mod property;
mod runtime;
mod track;
mod value;

pub use clip::{AnimationClip, ClipDef, ClipOptions};
pub use property::{Animatable, AnimationTargets, Property};
pub use runtime::{
    AnimationEvent, AnimationInstance, AnimationRuntime, InstanceId, PlayOptions, PlaybackState,
};
pub use track::{Keyframe, KeyframeTrack};
pub use value::{Rgb, TrackValue, ValueKind};

/// Malformed clip or track data, rejected when the clip is built.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AnimationError {
    #[error("track `{property}` has no keyframes")]
    EmptyTrack { property: String },
    #[error("track `{property}` has keyframe time {time} outside [0, 100]")]
    InvalidKeyTime { property: String, time: f32 },
    #[error("track `{property}` has keyframe label `{label}` that is not a percentage")]
    InvalidKeyLabel { property: String, label: String },
    #[error("track `{property}` has a non-finite value at {time}")]
    NonFiniteValue { property: String, time: f32 },
    #[error("track `{property}` has two keyframes at {time}%")]
    DuplicateKeyTime { property: String, time: f32 },
    #[error("track `{property}` mixes {first:?} and {second:?} values")]
    MixedValueKinds {
        property: String,
        first: ValueKind,
        second: ValueKind,
    },
    #[error("track `{property}` mixes vectors of length {expected} and {found}")]
    VectorLengthMismatch {
        property: String,
        expected: usize,
        found: usize,
    },
    #[error("clip duration must be a finite number of milliseconds > 0, got {0}")]
    InvalidDuration(f64),
    #[error("clip delay must be a finite number of milliseconds >= 0, got {0}")]
    InvalidDelay(f64),
}
