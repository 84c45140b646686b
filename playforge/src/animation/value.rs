use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::math::Vec2;

/// 8-bit RGB colour, written as `#rrggbb`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse `#RRGGBB` (case-insensitive).
    pub fn parse_hex(s: &str) -> Option<Self> {
        let hex = s.strip_prefix('#')?;
        if hex.len() != 6 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        Some(Self::new(channel(0)?, channel(2)?, channel(4)?))
    }

    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    /// Per-channel interpolation, rounded half away from zero and clamped to 0..=255.
    pub fn lerp(self, other: Rgb, t: f32) -> Rgb {
        let mix = |a: u8, b: u8| {
            let v = a as f32 + (b as f32 - a as f32) * t;
            v.round().clamp(0.0, 255.0) as u8
        };
        Rgb::new(mix(self.r, other.r), mix(self.g, other.g), mix(self.b, other.b))
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for Rgb {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Rgb::parse_hex(s).ok_or_else(|| format!("`{s}` is not a #rrggbb colour"))
    }
}

impl From<Rgb> for String {
    fn from(value: Rgb) -> Self {
        value.to_hex()
    }
}

impl TryFrom<String> for Rgb {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// A keyframe value.
///
/// In JSON a number, an array of numbers, a `#rrggbb` string, or any other
/// string (sampled as a step).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TrackValue {
    Number(f32),
    Vector(Vec<f32>),
    Color(Rgb),
    Discrete(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Number,
    Vector,
    Color,
    Discrete,
}

impl TrackValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            TrackValue::Number(_) => ValueKind::Number,
            TrackValue::Vector(_) => ValueKind::Vector,
            TrackValue::Color(_) => ValueKind::Color,
            TrackValue::Discrete(_) => ValueKind::Discrete,
        }
    }

    /// Numeric components are all finite. Colours and discrete values always are.
    pub fn is_finite(&self) -> bool {
        match self {
            TrackValue::Number(n) => n.is_finite(),
            TrackValue::Vector(v) => v.iter().all(|c| c.is_finite()),
            TrackValue::Color(_) | TrackValue::Discrete(_) => true,
        }
    }

    pub fn as_number(&self) -> Option<f32> {
        match self {
            TrackValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// First two components of a vector value.
    pub fn as_vec2(&self) -> Option<Vec2> {
        match self {
            TrackValue::Vector(v) if v.len() >= 2 => Some(Vec2::new(v[0], v[1])),
            _ => None,
        }
    }

    pub fn as_color(&self) -> Option<Rgb> {
        match self {
            TrackValue::Color(c) => Some(*c),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            TrackValue::Discrete(s) => Some(s),
            _ => None,
        }
    }

    /// Blend towards `end` by `t`.
    ///
    /// Numbers, equal-length vectors and colours interpolate; anything else
    /// holds `self` until `t` reaches 0.5 and then switches to `end`.
    pub fn interpolate(&self, end: &TrackValue, t: f32) -> TrackValue {
        match (self, end) {
            (TrackValue::Number(a), TrackValue::Number(b)) => TrackValue::Number(a + (b - a) * t),
            (TrackValue::Vector(a), TrackValue::Vector(b)) if a.len() == b.len() => {
                TrackValue::Vector(a.iter().zip(b).map(|(a, b)| a + (b - a) * t).collect())
            }
            (TrackValue::Color(a), TrackValue::Color(b)) => TrackValue::Color(a.lerp(*b, t)),
            _ => {
                if t < 0.5 {
                    self.clone()
                } else {
                    end.clone()
                }
            }
        }
    }
}

impl From<f32> for TrackValue {
    fn from(value: f32) -> Self {
        TrackValue::Number(value)
    }
}

impl From<f64> for TrackValue {
    fn from(value: f64) -> Self {
        TrackValue::Number(value as f32)
    }
}

impl From<Vec<f64>> for TrackValue {
    fn from(value: Vec<f64>) -> Self {
        TrackValue::Vector(value.into_iter().map(|v| v as f32).collect())
    }
}

impl<const N: usize> From<[f64; N]> for TrackValue {
    fn from(value: [f64; N]) -> Self {
        TrackValue::Vector(value.iter().map(|v| *v as f32).collect())
    }
}

impl From<Vec<f32>> for TrackValue {
    fn from(value: Vec<f32>) -> Self {
        TrackValue::Vector(value)
    }
}

impl<const N: usize> From<[f32; N]> for TrackValue {
    fn from(value: [f32; N]) -> Self {
        TrackValue::Vector(value.to_vec())
    }
}

impl From<Vec2> for TrackValue {
    fn from(value: Vec2) -> Self {
        TrackValue::Vector(vec![value.x, value.y])
    }
}

impl From<Rgb> for TrackValue {
    fn from(value: Rgb) -> Self {
        TrackValue::Color(value)
    }
}

impl From<bool> for TrackValue {
    fn from(value: bool) -> Self {
        TrackValue::Discrete(value.to_string())
    }
}

/// `#rrggbb` strings become colours, everything else a discrete value.
impl From<&str> for TrackValue {
    fn from(value: &str) -> Self {
        match Rgb::parse_hex(value) {
            Some(color) => TrackValue::Color(color),
            None => TrackValue::Discrete(value.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn black_to_white_midpoint_rounds_up() {
        let mid = TrackValue::from("#000000").interpolate(&TrackValue::from("#ffffff"), 0.5);
        assert_eq!(mid, TrackValue::Color(Rgb::new(0x80, 0x80, 0x80)));
        assert_eq!(mid.as_color().unwrap().to_hex(), "#808080");
    }

    #[test]
    fn hex_parsing() {
        assert_eq!(Rgb::parse_hex("#FF8000"), Some(Rgb::new(255, 128, 0)));
        assert_eq!(Rgb::parse_hex("FF8000"), None);
        assert_eq!(Rgb::parse_hex("#fff"), None);
        assert_eq!(Rgb::parse_hex("#gg0000"), None);
        assert_eq!(TrackValue::from("#abc"), TrackValue::Discrete("#abc".into()));
    }

    #[test]
    fn vectors_interpolate_per_component() {
        let a = TrackValue::from([0.0, 10.0, -4.0]);
        let b = TrackValue::from([10.0, 20.0, 4.0]);
        assert_eq!(a.interpolate(&b, 0.25), TrackValue::from([2.5, 12.5, -2.0]));
    }

    #[test]
    fn discrete_values_step_at_half() {
        let a = TrackValue::from("idle");
        let b = TrackValue::from("run");
        assert_eq!(a.interpolate(&b, 0.49), a);
        assert_eq!(a.interpolate(&b, 0.5), b);
    }

    #[test]
    fn colour_overshoot_is_clamped() {
        let c = Rgb::new(0, 0, 0).lerp(Rgb::new(255, 255, 255), 1.2);
        assert_eq!(c, Rgb::WHITE);
    }

    #[test]
    fn json_forms() {
        let values: Vec<TrackValue> =
            serde_json::from_str(r##"[0.5, [1, 2], "#ff0000", "hidden"]"##).unwrap();
        assert_eq!(
            values,
            vec![
                TrackValue::Number(0.5),
                TrackValue::Vector(vec![1.0, 2.0]),
                TrackValue::Color(Rgb::new(255, 0, 0)),
                TrackValue::Discrete("hidden".into()),
            ]
        );
        assert_eq!(
            serde_json::to_string(&TrackValue::Color(Rgb::new(0, 255, 0))).unwrap(),
            "\"#00ff00\""
        );
    }
}
