//! Rounding applied to both sides of a verification comparison
//!
//! Ties round away from zero everywhere (`f64::round`).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Largest meaningful number of decimal places for an `f64`; larger precisions are clamped
pub const MAX_PRECISION: i32 = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundingPolicy {
    /// Nearest value with `precision` decimal places
    Nearest,
    /// Nearest whole number, precision ignored
    Integer,
    /// Raw comparison
    Identity,
}

impl RoundingPolicy {
    pub fn round(&self, value: f64, precision: i32) -> f64 {
        match self {
            RoundingPolicy::Nearest => {
                let multiplier = 10f64.powi(precision.clamp(-MAX_PRECISION, MAX_PRECISION));
                (value * multiplier).round() / multiplier
            }
            RoundingPolicy::Integer => value.round(),
            RoundingPolicy::Identity => value,
        }
    }

    /// Round every element in place
    pub fn round_all(&self, values: &mut [f64], precision: i32) {
        for v in values.iter_mut() {
            *v = self.round(*v, precision);
        }
    }
}

impl fmt::Display for RoundingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoundingPolicy::Nearest => write!(f, "nearest"),
            RoundingPolicy::Integer => write!(f, "integer"),
            RoundingPolicy::Identity => write!(f, "identity"),
        }
    }
}

impl std::str::FromStr for RoundingPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "nearest" => Ok(RoundingPolicy::Nearest),
            "integer" => Ok(RoundingPolicy::Integer),
            "identity" | "none" => Ok(RoundingPolicy::Identity),
            _ => Err(format!(
                "Unknown rounding: {}. Use nearest, integer, or identity.",
                s
            )),
        }
    }
}
