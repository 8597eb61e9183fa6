//! Parameter definition
//!
//! A `Parameter` is identified by its dotted path (`M1.scale`). It carries its
//! current value, its bounds, and an optional constraint expression; a parameter
//! with an expression is computed from the others rather than fitted.

use crate::parameters::bounds::{Bounds, BoundsError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when working with parameters
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParameterError {
    #[error("Bounds error: {0}")]
    BoundsError(#[from] BoundsError),

    #[error("Parameter '{name}' not found")]
    ParameterNotFound { name: String },

    #[error("Parameter '{name}' already exists")]
    DuplicateParameter { name: String },

    #[error("Invalid parameter path '{name}'")]
    InvalidPath { name: String },
}

/// A named model parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    /// Dotted path of the parameter
    path: String,

    /// Current value of the parameter
    value: f64,

    /// Limits of the parameter value
    #[serde(default)]
    bounds: Bounds,

    /// The expression used to compute this parameter (empty when independent)
    #[serde(default, skip_serializing_if = "String::is_empty")]
    expression: String,
}

impl Parameter {
    /// Create an independent, unbounded parameter
    ///
    /// # Examples
    ///
    /// ```
    /// use sasfit_core::parameters::Parameter;
    ///
    /// let param = Parameter::new("M1.scale", 10.0);
    /// assert_eq!(param.path(), "M1.scale");
    /// assert_eq!(param.value(), 10.0);
    /// assert!(!param.is_computed());
    /// ```
    pub fn new(path: &str, value: f64) -> Self {
        Self {
            path: path.to_string(),
            value,
            bounds: Bounds::default(),
            expression: String::new(),
        }
    }

    /// Create a parameter limited to `[min, max]`
    pub fn with_bounds(path: &str, value: f64, min: f64, max: f64) -> Result<Self, ParameterError> {
        let bounds = Bounds::new(min, max)?;
        Ok(Self {
            bounds,
            ..Self::new(path, value)
        })
    }

    /// Create a parameter whose value is computed from `expression`
    pub fn with_expr(path: &str, expression: &str) -> Self {
        Self {
            expression: expression.trim().to_string(),
            ..Self::new(path, 0.0)
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn set_value(&mut self, value: f64) {
        self.value = value;
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    pub fn set_bounds(&mut self, bounds: Bounds) {
        self.bounds = bounds;
    }

    /// The constraint expression, `None` for an independent parameter
    pub fn expression(&self) -> Option<&str> {
        if self.expression.is_empty() {
            None
        } else {
            Some(&self.expression)
        }
    }

    /// Set or clear (with an empty string) the constraint expression
    pub fn set_expression(&mut self, expression: &str) {
        self.expression = expression.trim().to_string();
    }

    /// True when the value is computed from an expression
    pub fn is_computed(&self) -> bool {
        !self.expression.is_empty()
    }
}
