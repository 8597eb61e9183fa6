//! Parameter bounds
//!
//! A bound that is infinite is treated as absent, so a model that reports
//! `(None, Some(1.0))` for a parameter and one that reports `(-inf, 1.0)` are
//! handled identically by the fit engine.

use serde::{Deserialize, Serialize};
use std::f64::{INFINITY, NEG_INFINITY};
use thiserror::Error;

/// Errors that can occur when working with parameter bounds
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BoundsError {
    #[error("Invalid bounds: min ({min}) must not exceed max ({max})")]
    InvalidBounds { min: f64, max: f64 },

    #[error("Bounds may not be NaN")]
    NanBound,
}

/// Low and high limits of a parameter value
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    /// Minimum allowed value for the parameter
    pub min: f64,

    /// Maximum allowed value for the parameter
    pub max: f64,
}

impl Serialize for Bounds {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;

        let mut state = serializer.serialize_struct("Bounds", 2)?;
        state.serialize_field("min", &self.lower())?;
        state.serialize_field("max", &self.upper())?;
        state.end()
    }
}

impl<'de> Deserialize<'de> for Bounds {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct BoundsHelper {
            #[serde(default)]
            min: Option<f64>,

            #[serde(default)]
            max: Option<f64>,
        }

        let helper = BoundsHelper::deserialize(deserializer)?;
        Bounds::from_options(helper.min, helper.max).map_err(serde::de::Error::custom)
    }
}

impl Default for Bounds {
    fn default() -> Self {
        Self {
            min: NEG_INFINITY,
            max: INFINITY,
        }
    }
}

impl Bounds {
    /// Create bounds from min and max values
    ///
    /// # Examples
    ///
    /// ```
    /// use sasfit_core::parameters::Bounds;
    ///
    /// let bounds = Bounds::new(0.0, 10.0).unwrap();
    /// assert_eq!(bounds.min, 0.0);
    /// assert_eq!(bounds.max, 10.0);
    /// assert!(Bounds::new(1.0, 0.0).is_err());
    /// ```
    pub fn new(min: f64, max: f64) -> Result<Self, BoundsError> {
        if min.is_nan() || max.is_nan() {
            return Err(BoundsError::NanBound);
        }
        if min > max {
            return Err(BoundsError::InvalidBounds { min, max });
        }

        Ok(Self { min, max })
    }

    /// Create bounds from optional limits, `None` meaning unbounded on that side
    pub fn from_options(min: Option<f64>, max: Option<f64>) -> Result<Self, BoundsError> {
        Self::new(min.unwrap_or(NEG_INFINITY), max.unwrap_or(INFINITY))
    }

    /// Create an unbounded constraint (negative infinity to positive infinity)
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Create a bounds constraint with only a minimum value
    pub fn min_only(min: f64) -> Self {
        Self {
            min,
            max: INFINITY,
        }
    }

    /// Create a bounds constraint with only a maximum value
    pub fn max_only(max: f64) -> Self {
        Self {
            min: NEG_INFINITY,
            max,
        }
    }

    /// The finite lower limit, if any
    pub fn lower(&self) -> Option<f64> {
        self.min.is_finite().then_some(self.min)
    }

    /// The finite upper limit, if any
    pub fn upper(&self) -> Option<f64> {
        self.max.is_finite().then_some(self.max)
    }

    /// Check if a value lies inside the closed interval
    ///
    /// NaN is never within bounds.
    pub fn is_within_bounds(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    /// Check if the parameter is bounded from below
    pub fn has_lower_bound(&self) -> bool {
        self.min.is_finite()
    }

    /// Check if the parameter is bounded from above
    pub fn has_upper_bound(&self) -> bool {
        self.max.is_finite()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_creation() {
        let bounds = Bounds::new(-1.0, 1.0).unwrap();
        assert_eq!(bounds.lower(), Some(-1.0));
        assert_eq!(bounds.upper(), Some(1.0));

        assert_eq!(
            Bounds::new(2.0, 1.0),
            Err(BoundsError::InvalidBounds { min: 2.0, max: 1.0 })
        );
        assert_eq!(Bounds::new(f64::NAN, 1.0), Err(BoundsError::NanBound));

        let open = Bounds::from_options(None, Some(5.0)).unwrap();
        assert!(!open.has_lower_bound());
        assert!(open.has_upper_bound());
        assert_eq!(open, Bounds::max_only(5.0));
    }

    #[test]
    fn test_is_within_bounds() {
        let bounds = Bounds::new(0.0, 10.0).unwrap();
        assert!(bounds.is_within_bounds(0.0));
        assert!(bounds.is_within_bounds(10.0));
        assert!(!bounds.is_within_bounds(10.5));
        assert!(!bounds.is_within_bounds(f64::NAN));
        assert!(Bounds::unbounded().is_within_bounds(1e300));
    }

    #[test]
    fn test_serde_infinite_as_null() {
        let json = serde_json::to_string(&Bounds::min_only(0.5)).unwrap();
        assert_eq!(json, r#"{"min":0.5,"max":null}"#);

        let back: Bounds = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Bounds::min_only(0.5));

        let bad = serde_json::from_str::<Bounds>(r#"{"min":3.0,"max":1.0}"#);
        assert!(bad.is_err());
    }
}
