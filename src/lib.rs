//! # sasfit-core
//!
//! `sasfit-core` is the fitting core of a small-angle scattering analysis
//! application: it resolves parameter constraints written as expressions,
//! runs long computations on a cooperative background worker, and fits
//! models to data with a bounded Levenberg-Marquardt driver.
//!
//! The library provides:
//! - An expression resolver that orders and evaluates constraints between parameters
//! - A single-worker scheduler with cooperative cancellation and paced progress updates
//! - A fit orchestrator that keeps parameters inside their bounds
//!
//! ## Basic Usage
//!
//! ```
//! use ndarray::Array1;
//! use sasfit_core::fit::{model_handle, BaseModel, FitData, FitEngine};
//! use sasfit_core::parameters::{ParameterRegistry, ParameterSet};
//!
//! let mut params = ParameterSet::new();
//! params.add_param_with_bounds("scale", 1.0, 0.0, 100.0).unwrap();
//! params.add_param("background", 0.0).unwrap();
//! params.add_param("offset", 0.0).unwrap();
//!
//! let model = BaseModel::new("linear", params, |p, q| {
//!     let scale = p.get_param("scale")?;
//!     let background = p.get_param("background")?;
//!     Ok(q.mapv(|qi| scale * qi + background))
//! });
//!
//! let q = Array1::linspace(0.01, 0.1, 10);
//! let data = FitData::new(q.clone(), q.mapv(|qi| 4.0 * qi + 0.5), None).unwrap();
//!
//! let mut engine = FitEngine::new();
//! engine
//!     .set_model(0, model_handle(model), &["scale", "background"], &[("offset", "2 * background")])
//!     .unwrap();
//! engine.set_data(0, data, None, None);
//! engine.select_problem_for_fit(0, true);
//!
//! let result = engine.fit(&()).unwrap();
//! assert!((result.value("scale").unwrap() - 4.0).abs() < 1e-6);
//! let model = engine.get_model(0).unwrap();
//! let offset = model.lock().unwrap().get_param("offset").unwrap();
//! assert!((offset - 1.0).abs() < 1e-6);
//! ```

// Public modules
pub mod error;

// Parameter capability shared by the resolver and the fit engine
pub mod parameters;

pub mod expression;
pub mod fit;
pub mod scheduler;
pub mod utils;

// Re-exports for convenience
pub use error::{FitError, Result};
pub use expression::{build_evaluator, check_constraints, CompiledEvaluator, EvalContext, ExpressionError, SymbolTable};
pub use fit::{FitConfig, FitData, FitEngine, FitModel, FitResult, FitThread};
pub use parameters::{Bounds, ParameterRegistry, ParameterSet};
pub use scheduler::{CalcScheduler, Completion, SchedulerConfig, WorkContext};

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
