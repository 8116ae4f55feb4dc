//! Fixed-precision float normalization for geometry and quality fields.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Number of decimal places every [`RoundedFloat`] is normalized to
pub const ROUNDING_DECIMALS: usize = 3;

/// Round to [`ROUNDING_DECIMALS`] places, half-to-even on the exact binary value.
///
/// Non-finite inputs are returned unchanged.
pub fn round_to_precision(value: f64) -> f64 {
    if !value.is_finite() {
        return value;
    }
    format!("{:.*}", ROUNDING_DECIMALS, value)
        .parse()
        .unwrap_or(value)
}

/// A float that has passed through [`round_to_precision`].
///
/// Every construction path (constructor, `From<f64>`, deserialization) rounds,
/// so two values built from the same raw float are bit-identical.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize)]
#[serde(transparent)]
pub struct RoundedFloat(f64);

impl RoundedFloat {
    pub fn new(value: f64) -> Self {
        Self(round_to_precision(value))
    }

    pub fn get(self) -> f64 {
        self.0
    }

    pub fn is_finite(self) -> bool {
        self.0.is_finite()
    }
}

impl From<f64> for RoundedFloat {
    fn from(value: f64) -> Self {
        Self::new(value)
    }
}

impl From<RoundedFloat> for f64 {
    fn from(value: RoundedFloat) -> Self {
        value.0
    }
}

impl fmt::Display for RoundedFloat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<'de> Deserialize<'de> for RoundedFloat {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        f64::deserialize(deserializer).map(Self::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rounds_to_three_places() {
        assert_eq!(round_to_precision(1.23456), 1.235);
        assert_eq!(round_to_precision(-0.98765), -0.988);
        assert_eq!(round_to_precision(2.0), 2.0);
        assert_eq!(round_to_precision(1e-4), 0.0);
    }

    #[test]
    fn test_rounding_is_idempotent() {
        for raw in [0.1, 1.0005, 3.14159, -12.3456789, 1234.5678, 0.0005] {
            let once = round_to_precision(raw);
            let twice = round_to_precision(once);
            assert_eq!(once.to_bits(), twice.to_bits(), "raw = {raw}");
        }
    }

    #[test]
    fn test_independent_construction_is_bit_identical() {
        let a = RoundedFloat::new(0.123456);
        let b: RoundedFloat = 0.123456.into();
        assert_eq!(a.get().to_bits(), b.get().to_bits());
    }

    #[test]
    fn test_deserialize_rounds() {
        let value: RoundedFloat = serde_json::from_str("7.77777").unwrap();
        assert_eq!(value.get(), 7.778);

        let from_int: RoundedFloat = serde_json::from_str("3").unwrap();
        assert_eq!(from_int.get(), 3.0);
    }

    #[test]
    fn test_non_finite_passthrough() {
        assert!(round_to_precision(f64::NAN).is_nan());
        assert_eq!(round_to_precision(f64::INFINITY), f64::INFINITY);
        assert!(!RoundedFloat::new(f64::NEG_INFINITY).is_finite());
    }
}
