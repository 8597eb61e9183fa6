//! Fit results, shared with progress callbacks while the fit runs

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a fit stands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FitStatus {
    /// Intermediate result of a fit in progress
    Running,

    /// The solver reported convergence
    Converged,

    /// The solver stopped without converging
    NotConverged,
}

/// State of a fit, updated after every residual evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitResult {
    /// Names of the fitted parameters
    pub param_names: Vec<String>,

    /// Parameter values, in `param_names` order
    pub pvec: Vec<f64>,

    /// Standard errors of `pvec`; empty when unavailable
    pub stderr: Vec<f64>,

    /// Goodness of fit (mean squared residual); `None` for a failed fit
    pub fitness: Option<f64>,

    /// Number of residual evaluations requested by the solver
    pub iterations: usize,

    /// Model values over the fitted points
    pub theory: Vec<f64>,

    /// Residuals over the fitted points
    pub residuals: Vec<f64>,

    pub status: FitStatus,

    /// Paths of the parameters computed by constraints, in evaluation order
    #[serde(default)]
    pub constrained_names: Vec<String>,

    /// Values of the constrained parameters, in `constrained_names` order
    #[serde(default)]
    pub constrained_values: Vec<f64>,

    /// Standard errors of `constrained_values`, propagated from the fitted
    /// parameters; empty when unavailable
    #[serde(default)]
    pub constrained_stderr: Vec<f64>,

    /// Solver termination message
    pub message: String,
}

impl FitResult {
    /// An empty running result for the given parameters
    pub fn new(param_names: Vec<String>) -> Self {
        Self {
            param_names,
            pvec: Vec::new(),
            stderr: Vec::new(),
            fitness: None,
            iterations: 0,
            theory: Vec::new(),
            residuals: Vec::new(),
            status: FitStatus::Running,
            message: String::new(),
            constrained_names: Vec::new(),
            constrained_values: Vec::new(),
            constrained_stderr: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == FitStatus::Converged
    }

    /// Value of a fitted or constrained parameter by name
    pub fn value(&self, name: &str) -> Option<f64> {
        match position(&self.param_names, name) {
            Some(i) => self.pvec.get(i).copied(),
            None => position(&self.constrained_names, name).and_then(|i| self.constrained_values.get(i).copied()),
        }
    }

    /// Standard error of a fitted or constrained parameter by name
    pub fn error(&self, name: &str) -> Option<f64> {
        match position(&self.param_names, name) {
            Some(i) => self.stderr.get(i).copied(),
            None => position(&self.constrained_names, name).and_then(|i| self.constrained_stderr.get(i).copied()),
        }
    }
}

fn position(names: &[String], name: &str) -> Option<usize> {
    names.iter().position(|n| n.eq_ignore_ascii_case(name))
}

fn write_line(f: &mut fmt::Formatter<'_>, index: usize, name: &str, value: Option<f64>, err: Option<f64>) -> fmt::Result {
    let value = value.map_or("-".to_string(), |v| v.to_string());
    match err {
        Some(err) => writeln!(f, "P{:<3} {}......|.....{} +/- {}", index, name, value, err),
        None => writeln!(f, "P{:<3} {}......|.....{}", index, name, value),
    }
}

impl fmt::Display for FitResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "[Iteration #: {} ]", self.iterations)?;
        match self.fitness {
            Some(fitness) => writeln!(f, "=== goodness of fit: {} ===", fitness)?,
            None => writeln!(f, "=== goodness of fit: None ===")?,
        }
        for (i, name) in self.param_names.iter().enumerate() {
            write_line(f, i, name, self.pvec.get(i).copied(), self.stderr.get(i).copied())?;
        }
        if !self.constrained_names.is_empty() {
            writeln!(f, "=== constrained ===")?;
            let offset = self.param_names.len();
            for (i, name) in self.constrained_names.iter().enumerate() {
                let value = self.constrained_values.get(i).copied();
                write_line(f, offset + i, name, value, self.constrained_stderr.get(i).copied())?;
            }
        }
        Ok(())
    }
}
