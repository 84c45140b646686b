//! Easing curves mapping normalized time to normalized progress.
//!
//! All curves satisfy `f(0) == 0` and `f(1) == 1`. The elastic family
//! overshoots outside [0, 1] in between.

use std::f32::consts::PI;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Easing {
    #[default]
    #[serde(rename = "linear")]
    Linear,
    #[serde(rename = "easeInQuad")]
    InQuad,
    #[serde(rename = "easeOutQuad")]
    OutQuad,
    #[serde(rename = "easeInOutQuad")]
    InOutQuad,
    #[serde(rename = "easeInCubic")]
    InCubic,
    #[serde(rename = "easeOutCubic")]
    OutCubic,
    #[serde(rename = "easeInOutCubic")]
    InOutCubic,
    #[serde(rename = "easeInElastic")]
    InElastic,
    #[serde(rename = "easeOutElastic")]
    OutElastic,
    #[serde(rename = "easeInOutElastic")]
    InOutElastic,
}

impl Easing {
    pub const ALL: [Easing; 10] = [
        Easing::Linear,
        Easing::InQuad,
        Easing::OutQuad,
        Easing::InOutQuad,
        Easing::InCubic,
        Easing::OutCubic,
        Easing::InOutCubic,
        Easing::InElastic,
        Easing::OutElastic,
        Easing::InOutElastic,
    ];

    pub fn apply(self, t: f32) -> f32 {
        match self {
            Easing::Linear => t,
            Easing::InQuad => t * t,
            Easing::OutQuad => t * (2.0 - t),
            Easing::InOutQuad => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(2) / 2.0
                }
            }
            Easing::InCubic => t * t * t,
            Easing::OutCubic => 1.0 - (1.0 - t).powi(3),
            Easing::InOutCubic => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
                }
            }
            Easing::InElastic => elastic_in(t),
            Easing::OutElastic => elastic_out(t),
            Easing::InOutElastic => elastic_in_out(t),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Easing::Linear => "linear",
            Easing::InQuad => "easeInQuad",
            Easing::OutQuad => "easeOutQuad",
            Easing::InOutQuad => "easeInOutQuad",
            Easing::InCubic => "easeInCubic",
            Easing::OutCubic => "easeOutCubic",
            Easing::InOutCubic => "easeInOutCubic",
            Easing::InElastic => "easeInElastic",
            Easing::OutElastic => "easeOutElastic",
            Easing::InOutElastic => "easeInOutElastic",
        }
    }

    /// Look up an easing by name, falling back to [`Easing::Linear`].
    pub fn from_name(name: &str) -> Self {
        name.parse().unwrap_or_else(|err| {
            log::warn!("{err}; using linear");
            Easing::Linear
        })
    }

    /// Whether the curve can leave the [0, 1] range.
    pub fn overshoots(self) -> bool {
        matches!(
            self,
            Easing::InElastic | Easing::OutElastic | Easing::InOutElastic
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown easing `{0}`")]
pub struct UnknownEasing(pub String);

impl FromStr for Easing {
    type Err = UnknownEasing;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Easing::ALL
            .into_iter()
            .find(|e| e.name() == s)
            .ok_or_else(|| UnknownEasing(s.to_string()))
    }
}

impl fmt::Display for Easing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn elastic_in(t: f32) -> f32 {
    const C4: f32 = (2.0 * PI) / 3.0;
    if t <= 0.0 {
        0.0
    } else if t >= 1.0 {
        1.0
    } else {
        -(2f32.powf(10.0 * t - 10.0)) * ((10.0 * t - 10.75) * C4).sin()
    }
}

fn elastic_out(t: f32) -> f32 {
    const C4: f32 = (2.0 * PI) / 3.0;
    if t <= 0.0 {
        0.0
    } else if t >= 1.0 {
        1.0
    } else {
        2f32.powf(-10.0 * t) * ((10.0 * t - 0.75) * C4).sin() + 1.0
    }
}

fn elastic_in_out(t: f32) -> f32 {
    const C5: f32 = (2.0 * PI) / 4.5;
    if t <= 0.0 {
        0.0
    } else if t >= 1.0 {
        1.0
    } else if t < 0.5 {
        -(2f32.powf(20.0 * t - 10.0) * ((20.0 * t - 11.125) * C5).sin()) / 2.0
    } else {
        (2f32.powf(-20.0 * t + 10.0) * ((20.0 * t - 11.125) * C5).sin()) / 2.0 + 1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_are_fixed() {
        for easing in Easing::ALL {
            assert!(easing.apply(0.0).abs() < 1e-6, "{easing} at 0");
            assert!((easing.apply(1.0) - 1.0).abs() < 1e-6, "{easing} at 1");
        }
    }

    #[test]
    fn matches_reference_values() {
        let cases = [
            (Easing::Linear, 0.25, 0.25),
            (Easing::InQuad, 0.5, 0.25),
            (Easing::OutQuad, 0.5, 0.75),
            (Easing::InOutQuad, 0.25, 0.125),
            (Easing::InOutQuad, 0.75, 0.875),
            (Easing::InCubic, 0.5, 0.125),
            (Easing::OutCubic, 0.5, 0.875),
            (Easing::InOutCubic, 0.25, 0.0625),
            (Easing::InOutCubic, 0.75, 0.9375),
            (Easing::InOutElastic, 0.5, 0.5),
        ];
        for (easing, t, expected) in cases {
            let got = easing.apply(t);
            assert!((got - expected).abs() < 1e-5, "{easing}({t}) = {got}, want {expected}");
        }
    }

    #[test]
    fn in_out_variants_are_symmetric() {
        for easing in [Easing::InOutQuad, Easing::InOutCubic] {
            for i in 0..=10 {
                let t = i as f32 / 10.0;
                let sum = easing.apply(t) + easing.apply(1.0 - t);
                assert!((sum - 1.0).abs() < 1e-5, "{easing} at {t}");
            }
        }
    }

    #[test]
    fn elastic_overshoots() {
        assert!(Easing::OutElastic.overshoots());
        let peak = (1..100)
            .map(|i| Easing::OutElastic.apply(i as f32 / 100.0))
            .fold(f32::MIN, f32::max);
        assert!(peak > 1.0);
    }

    #[test]
    fn unknown_name_falls_back_to_linear() {
        assert_eq!(Easing::from_name("easeOutCubic"), Easing::OutCubic);
        assert_eq!(Easing::from_name("bounce"), Easing::Linear);
        assert!("bounce".parse::<Easing>().is_err());
    }

    #[test]
    fn serde_uses_display_names() {
        let json = serde_json::to_string(&Easing::InOutQuad).unwrap();
        assert_eq!(json, "\"easeInOutQuad\"");
        let back: Easing = serde_json::from_str("\"easeOutElastic\"").unwrap();
        assert_eq!(back, Easing::OutElastic);
    }
}
