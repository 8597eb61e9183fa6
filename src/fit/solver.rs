//! Adapter to the `levenberg-marquardt` solver
//!
//! The solver drives a [`LeastSquaresProblem`]; this module wraps the
//! residual functor in one, with a forward finite-difference Jacobian. A
//! residual or Jacobian evaluation that fails (model error or cancellation)
//! stops the solver; the error is kept and returned once it unwinds.

use levenberg_marquardt::{LeastSquaresProblem, LevenbergMarquardt};
use nalgebra::storage::Owned;
use nalgebra::{DMatrix, DVector, Dyn};
use ndarray::{Array1, Array2, Axis};
use std::cell::RefCell;

use crate::error::{FitError, Result};
use crate::fit::engine::FitConfig;
use crate::fit::functor::ResidualFunctor;
use crate::fit::monitor::FitMonitor;
use crate::utils::{
    jacobian, nalgebra_to_ndarray, nalgebra_vec_to_ndarray, ndarray_to_nalgebra, ndarray_vec_to_nalgebra,
};

/// What the solver reported
#[derive(Debug, Clone)]
pub(crate) struct SolverOutcome {
    pub params: Array1<f64>,
    pub converged: bool,
    pub message: String,
    pub evaluations: usize,
}

struct LmProblem<'f, 'a, M: FitMonitor + ?Sized> {
    functor: RefCell<&'f mut ResidualFunctor<'a, M>>,
    params: DVector<f64>,
    residuals: Option<DVector<f64>>,
    failure: RefCell<Option<FitError>>,
}

impl<'f, 'a, M: FitMonitor + ?Sized> LmProblem<'f, 'a, M> {
    fn new(functor: &'f mut ResidualFunctor<'a, M>, initial: &Array1<f64>) -> Self {
        let mut problem = Self {
            functor: RefCell::new(functor),
            params: ndarray_vec_to_nalgebra(initial),
            residuals: None,
            failure: RefCell::new(None),
        };
        problem.residuals = problem.evaluate(&problem.params);
        problem
    }

    fn evaluate(&self, x: &DVector<f64>) -> Option<DVector<f64>> {
        if self.failure.borrow().is_some() {
            return None;
        }
        let params = nalgebra_vec_to_ndarray(x);
        let outcome = self.functor.borrow_mut().evaluate(&params);
        match outcome {
            Ok(residuals) => Some(ndarray_vec_to_nalgebra(&residuals)),
            Err(e) => {
                self.fail(e);
                None
            }
        }
    }

    fn fail(&self, error: FitError) {
        if !error.is_cancelled() {
            log::warn!("residual evaluation failed: {}", error);
        }
        self.failure.replace(Some(error));
    }
}

impl<M: FitMonitor + ?Sized> LeastSquaresProblem<f64, Dyn, Dyn> for LmProblem<'_, '_, M> {
    type ResidualStorage = Owned<f64, Dyn>;
    type JacobianStorage = Owned<f64, Dyn, Dyn>;
    type ParameterStorage = Owned<f64, Dyn>;

    fn set_params(&mut self, x: &DVector<f64>) {
        self.params.copy_from(x);
        self.residuals = self.evaluate(x);
    }

    fn params(&self) -> DVector<f64> {
        self.params.clone()
    }

    fn residuals(&self) -> Option<DVector<f64>> {
        self.residuals.clone()
    }

    fn jacobian(&self) -> Option<DMatrix<f64>> {
        if self.failure.borrow().is_some() {
            return None;
        }
        let base = nalgebra_vec_to_ndarray(self.residuals.as_ref()?);
        let params = nalgebra_vec_to_ndarray(&self.params);

        let outcome = {
            let mut functor = self.functor.borrow_mut();
            jacobian(|p| functor.evaluate_quiet(p), &params, &base, None)
        };
        match outcome {
            Ok(jac) => Some(ndarray_to_nalgebra(&jac)),
            Err(e) => {
                self.fail(e);
                None
            }
        }
    }
}

/// Run the solver from `initial`
pub(crate) fn minimize<M: FitMonitor + ?Sized>(
    functor: &mut ResidualFunctor<'_, M>,
    initial: &Array1<f64>,
    config: &FitConfig,
) -> Result<SolverOutcome> {
    let problem = LmProblem::new(functor, initial);
    let (problem, report) = LevenbergMarquardt::<f64>::new()
        .with_ftol(config.ftol)
        .with_patience(config.patience)
        .minimize(problem);

    if let Some(error) = problem.failure.into_inner() {
        return Err(error);
    }

    Ok(SolverOutcome {
        params: nalgebra_vec_to_ndarray(&problem.params),
        converged: report.termination.was_successful(),
        message: format!("{:?}", report.termination),
        evaluations: report.number_of_evaluations,
    })
}

/// Standard errors of the free and of the constrained parameters
#[derive(Debug, Clone, Default)]
pub(crate) struct Uncertainties {
    pub free: Vec<f64>,
    pub constrained: Vec<f64>,
}

/// Standard errors at `params`, from the Jacobian of the residuals
///
/// Errors of the constrained parameters are propagated to first order
/// through the finite-difference gradient of their values.
pub(crate) fn uncertainties_at<M: FitMonitor + ?Sized>(
    functor: &mut ResidualFunctor<'_, M>,
    params: &Array1<f64>,
) -> Result<Uncertainties> {
    let residuals = functor.evaluate_quiet(params)?;
    let jac = jacobian(|p| functor.evaluate_quiet(p), params, &residuals, None)?;
    let Some(covariance) = covariance(&jac) else {
        return Ok(Uncertainties::default());
    };

    let constrained = if functor.has_constraints() {
        let values = functor.constrained_at(params)?;
        let gradient = jacobian(|p| functor.constrained_at(p), params, &values, None)?;
        propagate(&gradient, &covariance)
    } else {
        Vec::new()
    };

    Ok(Uncertainties {
        free: diagonal_errors(&covariance),
        constrained,
    })
}

/// `(JᵀJ)⁻¹`, or `None` when singular or not finite
pub(crate) fn covariance(jac: &Array2<f64>) -> Option<Array2<f64>> {
    let j = ndarray_to_nalgebra(jac);
    let jtj = j.transpose() * &j;

    let Some(covariance) = jtj.try_inverse() else {
        log::debug!("singular normal matrix, no standard errors");
        return None;
    };
    covariance
        .iter()
        .all(|v| v.is_finite())
        .then(|| nalgebra_to_ndarray(&covariance))
}

/// `sqrt(diag((JᵀJ)⁻¹))`, or empty when the covariance is singular or not finite
pub(crate) fn standard_errors(jac: &Array2<f64>) -> Vec<f64> {
    covariance(jac).map_or_else(Vec::new, |c| diagonal_errors(&c))
}

fn diagonal_errors(covariance: &Array2<f64>) -> Vec<f64> {
    finite_or_empty(covariance.diag().iter().map(|v| v.sqrt()).collect())
}

/// `sqrt(g C gᵀ)` for every row `g` of `gradient`
pub(crate) fn propagate(gradient: &Array2<f64>, covariance: &Array2<f64>) -> Vec<f64> {
    let weighted = gradient.dot(covariance);
    let variances = (&weighted * gradient).sum_axis(Axis(1));
    finite_or_empty(variances.iter().map(|v| v.sqrt()).collect())
}

fn finite_or_empty(values: Vec<f64>) -> Vec<f64> {
    if values.iter().all(|v| v.is_finite()) {
        values
    } else {
        Vec::new()
    }
}
