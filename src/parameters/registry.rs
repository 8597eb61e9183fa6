//! The parameter capability a model exposes to the fitting core
//!
//! The core never keeps its own copy of a parameter value: the expression
//! evaluator and the fit engine read and write values through this trait, and
//! the model stays the single owner.

use crate::parameters::bounds::Bounds;
use crate::parameters::parameter::ParameterError;

/// Named access to model parameters
///
/// Names are dotted paths and are matched case-insensitively.
pub trait ParameterRegistry {
    /// All parameter names, in the model's order
    fn param_names(&self) -> Vec<String>;

    /// Current value of a parameter
    fn get_param(&self, name: &str) -> Result<f64, ParameterError>;

    /// Assign a parameter value
    fn set_param(&mut self, name: &str, value: f64) -> Result<(), ParameterError>;

    /// Limits of a parameter, unbounded when the model declares none
    fn get_bounds(&self, name: &str) -> Result<Bounds, ParameterError>;

    /// Check whether a parameter with this name exists
    fn has_param(&self, name: &str) -> bool {
        self.param_names()
            .iter()
            .any(|candidate| candidate.eq_ignore_ascii_case(name))
    }

    /// Values of the named parameters, in the given order
    fn get_params(&self, names: &[String]) -> Result<Vec<f64>, ParameterError> {
        names.iter().map(|name| self.get_param(name)).collect()
    }

    /// Assign values to the named parameters, pairwise
    fn set_params(&mut self, names: &[String], values: &[f64]) -> Result<(), ParameterError> {
        for (name, value) in names.iter().zip(values) {
            self.set_param(name, *value)?;
        }
        Ok(())
    }
}

/// Canonical lookup key for a parameter path
pub(crate) fn canonical(name: &str) -> String {
    name.trim().to_ascii_lowercase()
}
