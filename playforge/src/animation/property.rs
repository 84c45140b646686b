use std::fmt;

use serde::{Deserialize, Serialize};

use super::value::TrackValue;
use crate::world::EntityId;

/// An animatable property, resolved once from a dotted path such as `"position.x"`.
///
/// Paths with no built-in meaning become [`Property::Custom`] and are handed
/// to the target as-is.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Property {
    X,
    Y,
    Position,
    Rotation,
    ScaleX,
    ScaleY,
    Scale,
    Width,
    Height,
    Size,
    Opacity,
    Color,
    Visible,
    Custom(String),
}

impl Property {
    pub fn parse(path: &str) -> Self {
        match path.trim() {
            "x" | "position.x" => Property::X,
            "y" | "position.y" => Property::Y,
            "position" => Property::Position,
            "rotation" | "angle" => Property::Rotation,
            "scaleX" | "scale.x" => Property::ScaleX,
            "scaleY" | "scale.y" => Property::ScaleY,
            "scale" => Property::Scale,
            "width" | "size.x" => Property::Width,
            "height" | "size.y" => Property::Height,
            "size" => Property::Size,
            "opacity" | "alpha" => Property::Opacity,
            "color" | "tint" => Property::Color,
            "visible" => Property::Visible,
            other => Property::Custom(other.to_string()),
        }
    }

    /// Canonical path for this property.
    pub fn path(&self) -> &str {
        match self {
            Property::X => "position.x",
            Property::Y => "position.y",
            Property::Position => "position",
            Property::Rotation => "rotation",
            Property::ScaleX => "scale.x",
            Property::ScaleY => "scale.y",
            Property::Scale => "scale",
            Property::Width => "size.x",
            Property::Height => "size.y",
            Property::Size => "size",
            Property::Opacity => "opacity",
            Property::Color => "color",
            Property::Visible => "visible",
            Property::Custom(path) => path,
        }
    }
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

impl From<&str> for Property {
    fn from(value: &str) -> Self {
        Property::parse(value)
    }
}

impl From<String> for Property {
    fn from(value: String) -> Self {
        Property::parse(&value)
    }
}

impl From<Property> for String {
    fn from(value: Property) -> Self {
        value.path().to_string()
    }
}

/// Something animation values can be written into.
pub trait Animatable {
    /// Write a sampled value. Implementations ignore values whose kind does not
    /// fit the property.
    fn apply(&mut self, property: &Property, value: &TrackValue);
}

/// Resolves animation targets by id. Targets are not owned by the runtime;
/// `None` means the target is gone.
pub trait AnimationTargets {
    fn animatable_mut(&mut self, target: EntityId) -> Option<&mut dyn Animatable>;
}
