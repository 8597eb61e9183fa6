//! # Bounded Fitting
//!
//! Fits a model to one or more data sets with the `levenberg-marquardt`
//! solver while keeping every free parameter inside its bounds.
//!
//! ## Core Components
//!
//! - [`FitData`]: samples, observations and uncertainties with a fit range
//! - [`FitModel`]: the model capability (parameters plus evaluation)
//! - [`FitArrange`] / [`FitRegistry`]: fit problems by id
//! - [`FitEngine`]: configures problems and fits the selected one
//! - [`FitThread`]: runs fits through a [`CalcScheduler`](crate::scheduler::CalcScheduler)
//!
//! ## Bounds
//!
//! The solver works on unbounded values. Before a proposed value reaches the
//! model, [`check_param_range`] pulls it back inside its bounds; when the
//! result still fails the bound check the evaluation is rejected by scaling
//! the last good residuals by [`FitConfig::penalty`].

pub mod arrange;
pub mod bounds_check;
pub mod data;
pub mod engine;
mod functor;
pub mod model;
pub mod monitor;
pub mod result;
mod solver;
pub mod thread;

pub use arrange::{FitArrange, FitRegistry, ProblemId};
pub use bounds_check::{check_param_range, chi_square, clamp_initial_values};
pub use data::FitData;
pub use engine::{FitConfig, FitEngine};
pub use model::{model_handle, BaseModel, FitModel, ModelHandle};
pub use monitor::FitMonitor;
pub use result::{FitResult, FitStatus};
pub use thread::{FitJob, FitThread};
