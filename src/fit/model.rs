//! The model capability consumed by the fit engine

use ndarray::Array1;
use std::sync::{Arc, Mutex};

use crate::error::Result;
use crate::parameters::{Bounds, ParameterError, ParameterRegistry, ParameterSet};

/// A model that can be evaluated at the samples of a data set
///
/// Parameters are read and written through the [`ParameterRegistry`]
/// supertrait; the model stays their only owner.
pub trait FitModel: ParameterRegistry + Send {
    /// Name used in logs and error messages
    fn name(&self) -> &str;

    /// Model values at `x`, one per sample
    fn eval(&self, x: &Array1<f64>) -> Result<Array1<f64>>;
}

/// A model shared between the host and a running fit
pub type ModelHandle = Arc<Mutex<dyn FitModel>>;

/// Wrap a model so it can be handed to the fit engine
pub fn model_handle<M: FitModel + 'static>(model: M) -> ModelHandle {
    Arc::new(Mutex::new(model))
}

type EvalFn = Box<dyn Fn(&ParameterSet, &Array1<f64>) -> Result<Array1<f64>> + Send + Sync>;

/// A model made of a [`ParameterSet`] and an evaluation function
///
/// # Examples
///
/// ```
/// use ndarray::array;
/// use sasfit_core::fit::{BaseModel, FitModel};
/// use sasfit_core::parameters::{ParameterRegistry, ParameterSet};
///
/// let mut params = ParameterSet::new();
/// params.add_param("slope", 2.0).unwrap();
/// params.add_param("intercept", 1.0).unwrap();
///
/// let model = BaseModel::new("line", params, |p, x| {
///     let slope = p.get_param("slope")?;
///     let intercept = p.get_param("intercept")?;
///     Ok(x.mapv(|xi| slope * xi + intercept))
/// });
/// assert_eq!(model.eval(&array![0.0, 1.0]).unwrap(), array![1.0, 3.0]);
/// ```
pub struct BaseModel {
    name: String,
    parameters: ParameterSet,
    eval_func: EvalFn,
}

impl BaseModel {
    pub fn new<F>(name: &str, parameters: ParameterSet, eval_func: F) -> Self
    where
        F: Fn(&ParameterSet, &Array1<f64>) -> Result<Array1<f64>> + Send + Sync + 'static,
    {
        Self {
            name: name.to_string(),
            parameters,
            eval_func: Box::new(eval_func),
        }
    }

    pub fn parameters(&self) -> &ParameterSet {
        &self.parameters
    }

    pub fn parameters_mut(&mut self) -> &mut ParameterSet {
        &mut self.parameters
    }
}

impl ParameterRegistry for BaseModel {
    fn param_names(&self) -> Vec<String> {
        self.parameters.param_names()
    }

    fn get_param(&self, name: &str) -> std::result::Result<f64, ParameterError> {
        self.parameters.get_param(name)
    }

    fn set_param(&mut self, name: &str, value: f64) -> std::result::Result<(), ParameterError> {
        self.parameters.set_param(name, value)
    }

    fn get_bounds(&self, name: &str) -> std::result::Result<Bounds, ParameterError> {
        self.parameters.get_bounds(name)
    }

    fn has_param(&self, name: &str) -> bool {
        self.parameters.has_param(name)
    }
}

impl FitModel for BaseModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn eval(&self, x: &Array1<f64>) -> Result<Array1<f64>> {
        (self.eval_func)(&self.parameters, x)
    }
}

impl std::fmt::Debug for BaseModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BaseModel")
            .field("name", &self.name)
            .field("parameters", &self.parameters)
            .finish()
    }
}
