use serde::{Deserialize, Serialize};

use super::property::{Animatable, Property};
use super::value::{TrackValue, ValueKind};
use super::AnimationError;

/// A value pinned at a point of the clip, in percent of its duration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Keyframe {
    pub percent: f32,
    pub value: TrackValue,
}

/// Keyframes for one property, sorted by time.
///
/// Construction rejects empty tracks, times outside [0, 100], repeated times
/// non-finite values and tracks that mix value kinds, so sampling never fails.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct KeyframeTrack {
    property: Property,
    keyframes: Vec<Keyframe>,
}

impl KeyframeTrack {
    pub fn new<I, V>(path: &str, keys: I) -> Result<Self, AnimationError>
    where
        I: IntoIterator<Item = (f32, V)>,
        V: Into<TrackValue>,
    {
        Self::with_property(Property::parse(path), keys)
    }

    pub fn with_property<I, V>(property: Property, keys: I) -> Result<Self, AnimationError>
    where
        I: IntoIterator<Item = (f32, V)>,
        V: Into<TrackValue>,
    {
        let mut keyframes: Vec<Keyframe> = keys
            .into_iter()
            .map(|(percent, value)| Keyframe {
                percent,
                value: value.into(),
            })
            .collect();

        let name = || property.path().to_string();

        if keyframes.is_empty() {
            return Err(AnimationError::EmptyTrack { property: name() });
        }
        if let Some(bad) = keyframes
            .iter()
            .find(|k| !(k.percent.is_finite() && (0.0..=100.0).contains(&k.percent)))
        {
            return Err(AnimationError::InvalidKeyTime {
                property: name(),
                time: bad.percent,
            });
        }

        if let Some(bad) = keyframes.iter().find(|k| !k.value.is_finite()) {
            return Err(AnimationError::NonFiniteValue {
                property: name(),
                time: bad.percent,
            });
        }

        keyframes.sort_by(|a, b| a.percent.total_cmp(&b.percent));

        for pair in keyframes.windows(2) {
            if pair[0].percent == pair[1].percent {
                return Err(AnimationError::DuplicateKeyTime {
                    property: name(),
                    time: pair[0].percent,
                });
            }
        }

        let first = &keyframes[0].value;
        for key in &keyframes[1..] {
            if key.value.kind() != first.kind() {
                return Err(AnimationError::MixedValueKinds {
                    property: name(),
                    first: first.kind(),
                    second: key.value.kind(),
                });
            }
            if let (TrackValue::Vector(a), TrackValue::Vector(b)) = (first, &key.value) {
                if a.len() != b.len() {
                    return Err(AnimationError::VectorLengthMismatch {
                        property: name(),
                        expected: a.len(),
                        found: b.len(),
                    });
                }
            }
        }

        Ok(Self {
            property,
            keyframes,
        })
    }

    pub fn property(&self) -> &Property {
        &self.property
    }

    pub fn keyframes(&self) -> &[Keyframe] {
        &self.keyframes
    }

    pub fn value_kind(&self) -> ValueKind {
        self.keyframes[0].value.kind()
    }

    /// Value at `progress` (0..=1 of the clip).
    ///
    /// Before the first or after the last keyframe the boundary value is held.
    pub fn sample(&self, progress: f32) -> TrackValue {
        let p = progress * 100.0;
        let first = &self.keyframes[0];
        let last = &self.keyframes[self.keyframes.len() - 1];

        if p.is_nan() || p <= first.percent {
            return first.value.clone();
        }
        if p >= last.percent {
            return last.value.clone();
        }

        // first.percent < p < last.percent, so 1 <= idx < len.
        let idx = self.keyframes.partition_point(|k| k.percent <= p);
        let before = &self.keyframes[idx - 1];
        let after = &self.keyframes[idx];
        let local = (p - before.percent) / (after.percent - before.percent);
        before.value.interpolate(&after.value, local)
    }

    pub fn apply(&self, progress: f32, target: &mut dyn Animatable) {
        target.apply(&self.property, &self.sample(progress));
    }
}
