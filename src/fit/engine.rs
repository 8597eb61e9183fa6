//! The fit engine: configure fit problems, then fit the selected one

use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::error::{FitError, Result};
use crate::expression::{check_constraints, EvalContext, ExpressionMap};
use crate::fit::arrange::{FitRegistry, ProblemId};
use crate::fit::bounds_check::clamp_initial_values;
use crate::fit::data::FitData;
use crate::fit::functor::ResidualFunctor;
use crate::fit::model::{FitModel, ModelHandle};
use crate::fit::monitor::FitMonitor;
use crate::fit::result::{FitResult, FitStatus};
use crate::fit::solver;
use crate::utils::lock;

/// Configuration of a fit run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitConfig {
    /// Relative tolerance on the reduction of the sum of squares. Default: 1.49012e-8
    pub ftol: f64,

    /// Evaluation budget, in multiples of (number of free parameters + 1). Default: 100
    pub patience: usize,

    /// Factor applied to the residuals of a rejected parameter vector. Default: 1e6
    pub penalty: f64,

    /// Restore the starting values recorded by `set_model` before fitting. Default: false
    pub reset_initial: bool,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            ftol: 1.49012e-8,
            patience: 100,
            penalty: 1e6,
            reset_initial: false,
        }
    }
}

impl FitConfig {
    pub fn with_ftol(mut self, ftol: f64) -> Self {
        self.ftol = ftol;
        self
    }

    pub fn with_patience(mut self, patience: usize) -> Self {
        self.patience = patience;
        self
    }

    pub fn with_penalty(mut self, penalty: f64) -> Self {
        self.penalty = penalty;
        self
    }

    pub fn with_reset_initial(mut self, reset_initial: bool) -> Self {
        self.reset_initial = reset_initial;
        self
    }

    /// Load a configuration from JSON, missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Fits one model against its data sets
///
/// # Examples
///
/// ```
/// use ndarray::Array1;
/// use sasfit_core::fit::{model_handle, BaseModel, FitData, FitEngine};
/// use sasfit_core::parameters::{ParameterRegistry, ParameterSet};
///
/// let mut params = ParameterSet::new();
/// params.add_param("slope", 1.0).unwrap();
/// params.add_param("intercept", 0.0).unwrap();
/// let model = model_handle(BaseModel::new("line", params, |p, x| {
///     let (a, b) = (p.get_param("slope")?, p.get_param("intercept")?);
///     Ok(x.mapv(|xi| a * xi + b))
/// }));
///
/// let x = Array1::linspace(0.0, 9.0, 10);
/// let y = x.mapv(|xi| 3.0 * xi - 2.0);
///
/// let mut engine = FitEngine::new();
/// engine.set_model(1, model, &["slope", "intercept"], &[]).unwrap();
/// engine.set_data(1, FitData::new(x, y, None).unwrap(), None, None);
/// engine.select_problem_for_fit(1, true);
///
/// let result = engine.fit(&()).unwrap();
/// assert!((result.value("slope").unwrap() - 3.0).abs() < 1e-6);
/// assert!(result.fitness.unwrap() < 1e-10);
/// ```
#[derive(Debug, Clone, Default)]
pub struct FitEngine {
    registry: FitRegistry,
    config: FitConfig,
    context: EvalContext,
}

impl FitEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: FitConfig) -> Self {
        self.config = config;
        self
    }

    /// Names and functions available to constraint expressions
    pub fn with_context(mut self, context: EvalContext) -> Self {
        self.context = context;
        self
    }

    pub fn config(&self) -> &FitConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: FitConfig) {
        self.config = config;
    }

    pub fn registry(&self) -> &FitRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut FitRegistry {
        &mut self.registry
    }

    /// Set the model of problem `id`, its free parameters and its constraints
    ///
    /// Constraints are `(parameter, expression)` pairs; they are compiled and
    /// run once against the current values here, so syntax errors, cycles and
    /// undefined names are all reported before any fit starts.
    ///
    /// # Errors
    ///
    /// - `Configuration` if `pars` is empty, names a parameter the model does
    ///   not have, or names a constrained parameter
    /// - `InvalidConstraints` listing every problem found in the constraints
    pub fn set_model(
        &mut self,
        id: ProblemId,
        model: ModelHandle,
        pars: &[&str],
        constraints: &[(&str, &str)],
    ) -> Result<()> {
        let constraints: ExpressionMap = constraints
            .iter()
            .map(|(name, expr)| (name.to_string(), expr.to_string()))
            .collect();

        let (pars, values, evaluator) = {
            let guard = lock(&model);
            let pars = validate_pars(&*guard, pars)?;
            if let Some(name) = pars.iter().find(|p| constraints.keys().any(|c| c.eq_ignore_ascii_case(p))) {
                return Err(FitError::Configuration(format!(
                    "parameter {} is constrained and cannot also be fitted",
                    name
                )));
            }

            let evaluator = check_constraints(&*guard, &constraints, &self.context)
                .map_err(|errors| FitError::InvalidConstraints { errors })?;
            let values = guard.get_params(&pars)?;
            (pars, values, evaluator)
        };

        log::debug!("problem {}: {} free parameter(s), {} constraint(s)", id, pars.len(), evaluator.len());

        let problem = self.registry.entry(id);
        problem.set_model(model, pars, values);
        problem.set_constraints(constraints, evaluator);
        Ok(())
    }

    /// Add a data set to problem `id`, restricted to `[qmin, qmax]`
    pub fn set_data(&mut self, id: ProblemId, mut data: FitData, qmin: Option<f64>, qmax: Option<f64>) {
        data.set_fit_range(qmin, qmax);
        self.registry.entry(id).add_data(data);
    }

    /// Change the free parameters of problem `id`
    pub fn set_param_list(&mut self, id: ProblemId, pars: &[&str]) -> Result<()> {
        let problem = self
            .registry
            .get_mut(id)
            .ok_or_else(|| FitError::Configuration(format!("no fit problem with id {}", id)))?;
        let model = problem
            .model()
            .cloned()
            .ok_or_else(|| FitError::Configuration(format!("fit problem {} has no model", id)))?;

        let (pars, values) = {
            let guard = lock(&model);
            let pars = validate_pars(&*guard, pars)?;
            if let Some(name) = pars.iter().find(|p| problem.evaluator().map_or(false, |e| e.computes(p))) {
                return Err(FitError::Configuration(format!(
                    "parameter {} is constrained and cannot also be fitted",
                    name
                )));
            }
            let values = guard.get_params(&pars)?;
            (pars, values)
        };
        problem.set_model(model, pars, values);
        Ok(())
    }

    pub fn select_problem_for_fit(&mut self, id: ProblemId, selected: bool) {
        self.registry.select_problem_for_fit(id, selected);
    }

    pub fn get_model(&self, id: ProblemId) -> Option<ModelHandle> {
        self.registry.get_model(id)
    }

    pub fn remove_fit_problem(&mut self, id: ProblemId) {
        self.registry.remove_fit_problem(id);
    }

    /// Fit the selected problem
    ///
    /// The model is left at the fitted values. `monitor` sees every
    /// intermediate result and can cancel the fit.
    ///
    /// # Errors
    ///
    /// - `Configuration` when not exactly one problem is selected, or it
    ///   lacks a model or data
    /// - `Cancelled` when the monitor asked to stop
    /// - any error raised by the model or the constraints
    pub fn fit<M: FitMonitor + ?Sized>(&self, monitor: &M) -> Result<FitResult> {
        let (id, problem) = self.registry.single_selected()?;
        let handle = problem
            .model()
            .ok_or_else(|| FitError::Configuration(format!("fit problem {} has no model", id)))?;
        if problem.data().is_empty() {
            return Err(FitError::Configuration(format!("fit problem {} has no data", id)));
        }

        let mut guard = lock(handle);
        let model: &mut dyn FitModel = &mut *guard;

        if self.config.reset_initial {
            model.set_params(problem.pars(), problem.initial_values())?;
        }
        clamp_initial_values(&mut *model, problem.pars())?;
        let initial = Array1::from(model.get_params(problem.pars())?);

        log::info!(
            "fitting {} parameter(s) of '{}' against {} data set(s)",
            problem.pars().len(),
            model.name(),
            problem.data().len()
        );

        let mut functor = ResidualFunctor::new(
            model,
            problem.data(),
            problem.pars(),
            problem.evaluator(),
            self.config.penalty,
            monitor,
        )?;

        let outcome = match solver::minimize(&mut functor, &initial, &self.config) {
            Ok(outcome) => outcome,
            Err(e) => {
                if e.is_cancelled() {
                    log::info!("fit of problem {} terminated", id);
                }
                return Err(e);
            }
        };

        let uncertainties = solver::uncertainties_at(&mut functor, &outcome.params)?;
        let mut result = functor.finish(&outcome.params)?;
        result.stderr = uncertainties.free;
        result.constrained_stderr = uncertainties.constrained;
        result.message = outcome.message;
        if outcome.converged {
            result.status = FitStatus::Converged;
        } else {
            result.status = FitStatus::NotConverged;
            result.fitness = None;
        }

        log::info!(
            "fit of problem {} finished after {} evaluation(s): {}",
            id,
            outcome.evaluations,
            result.message
        );
        Ok(result)
    }
}

/// Check that every name in `pars` is a model parameter
fn validate_pars(model: &dyn FitModel, pars: &[&str]) -> Result<Vec<String>> {
    if pars.is_empty() {
        return Err(FitError::Configuration(format!(
            "no parameters to fit for model '{}'",
            model.name()
        )));
    }
    pars.iter()
        .map(|name| {
            if model.has_param(name) {
                Ok(name.to_string())
            } else {
                Err(FitError::Configuration(format!(
                    "wrong parameter {} used to set model '{}'; choose parameter names within {:?}",
                    name,
                    model.name(),
                    model.param_names()
                )))
            }
        })
        .collect()
}
