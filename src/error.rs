use thiserror::Error;

use crate::expression::ExpressionError;
use crate::parameters::{BoundsError, ParameterError};

/// Error types for the sasfit-core library
#[derive(Error, Debug)]
pub enum FitError {
    /// Constraint expression failed to compile or evaluate
    #[error("Expression error: {0}")]
    Expression(#[from] ExpressionError),

    /// Constraint expressions rejected when a model is set, every problem listed
    #[error("Invalid constraints: {}", join_errors(.errors))]
    InvalidConstraints { errors: Vec<ExpressionError> },

    /// Parameter lookup or assignment failed
    #[error("Parameter error: {0}")]
    Parameter(#[from] ParameterError),

    /// Invalid bounds
    #[error("Bounds error: {0}")]
    Bounds(#[from] BoundsError),

    /// The fit problems are not arranged in a way the engine can run
    #[error("Fit configuration error: {0}")]
    Configuration(String),

    /// Error indicating a mismatch in vector lengths
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// Error during model evaluation
    #[error("Model evaluation error: {0}")]
    ModelEvaluation(String),

    /// The current work unit was asked to stop at a checkpoint
    ///
    /// This is a control-flow signal, not a failure.
    #[error("Computation cancelled")]
    Cancelled,

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Generic error for cases that don't fit the other categories
    #[error("Error: {0}")]
    Other(String),
}

impl FitError {
    /// True for the cooperative cancellation signal
    pub fn is_cancelled(&self) -> bool {
        matches!(self, FitError::Cancelled)
    }
}

fn join_errors(errors: &[ExpressionError]) -> String {
    errors.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

/// Result type alias for sasfit-core operations
pub type Result<T> = std::result::Result<T, FitError>;

impl From<String> for FitError {
    fn from(s: String) -> Self {
        FitError::Other(s)
    }
}

impl From<&str> for FitError {
    fn from(s: &str) -> Self {
        FitError::Other(s.to_string())
    }
}
