//! # Parameter Registry
//!
//! Models own their parameters; the fitting core reaches them only through the
//! [`ParameterRegistry`] capability (get/set a named value, read its bounds, list
//! the names). Both the expression resolver and the fit engine are written
//! against this trait.
//!
//! ## Core Components
//!
//! - [`Bounds`]: optional low/high limits of a parameter value
//! - [`Parameter`]: a dotted-path parameter with a value, bounds and an optional expression
//! - [`ParameterRegistry`]: the capability trait
//! - [`ParameterSet`]: an ordered, case-insensitive registry owning its parameters
//!
//! ## Example Usage
//!
//! ```rust
//! use sasfit_core::expression::EvalContext;
//! use sasfit_core::parameters::{ParameterRegistry, ParameterSet};
//!
//! let mut params = ParameterSet::new();
//! params.add_param("p1", 5.0).unwrap();
//! params.add_param_with_expr("p2", "p1 + 3").unwrap();
//!
//! params.update_expressions(&EvalContext::default()).unwrap();
//! assert_eq!(params.get_param("p2").unwrap(), 8.0);
//! ```

pub mod bounds;
pub mod parameter;
pub mod registry;
pub mod set;

// Re-export key types
pub use bounds::{Bounds, BoundsError};
pub use parameter::{Parameter, ParameterError};
pub use registry::ParameterRegistry;
pub use set::ParameterSet;
