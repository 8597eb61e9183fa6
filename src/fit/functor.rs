//! The residual function handed to the solver

use ndarray::Array1;

use crate::error::{FitError, Result};
use crate::expression::CompiledEvaluator;
use crate::fit::bounds_check::{check_param_range, chi_square};
use crate::fit::data::FitData;
use crate::fit::model::FitModel;
use crate::fit::monitor::FitMonitor;
use crate::fit::result::FitResult;
use crate::parameters::Bounds;

/// Residuals of one model against its data sets, as a function of the free parameters
///
/// Every evaluation writes the (clamped) free parameters into the model,
/// recomputes the constrained ones, evaluates every data set and
/// concatenates the residuals.
pub(crate) struct ResidualFunctor<'a, M: FitMonitor + ?Sized> {
    model: &'a mut dyn FitModel,
    datasets: &'a [FitData],
    names: &'a [String],
    bounds: Vec<Bounds>,
    constraints: Option<&'a CompiledEvaluator>,
    penalty: f64,
    monitor: &'a M,
    result: FitResult,
    last_good: Option<Array1<f64>>,
    n_points: usize,
}

impl<'a, M: FitMonitor + ?Sized> ResidualFunctor<'a, M> {
    pub(crate) fn new(
        model: &'a mut dyn FitModel,
        datasets: &'a [FitData],
        names: &'a [String],
        constraints: Option<&'a CompiledEvaluator>,
        penalty: f64,
        monitor: &'a M,
    ) -> Result<Self> {
        let bounds = names
            .iter()
            .map(|name| model.get_bounds(name))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let n_points = datasets.iter().map(FitData::n_fit_points).sum();
        if n_points == 0 {
            return Err(FitError::Configuration(
                "no data points inside the fit range".to_string(),
            ));
        }

        let mut result = FitResult::new(names.to_vec());
        if let Some(constraints) = constraints {
            result.constrained_names = constraints.order().into_iter().map(str::to_string).collect();
        }

        Ok(Self {
            model,
            datasets,
            names,
            bounds,
            constraints,
            penalty,
            monitor,
            result,
            last_good: None,
            n_points,
        })
    }

    /// Evaluation requested by the solver; updates the running result and reports progress
    pub(crate) fn evaluate(&mut self, params: &Array1<f64>) -> Result<Array1<f64>> {
        let (values, inside) = self.write_params(params)?;
        if !inside {
            log::debug!("{} out of bounds after clamping, penalizing", values);
            self.monitor.check_cancel()?;
            return Ok(self.penalized());
        }

        let (residuals, theory) = self.model_residuals()?;
        self.last_good = Some(residuals.clone());
        self.result.iterations += 1;
        self.result.pvec = values.to_vec();
        self.result.theory = theory.to_vec();
        self.result.residuals = residuals.to_vec();
        self.result.fitness = chi_square(&self.result.residuals);
        self.result.constrained_values = self.read_constrained()?;

        self.monitor.progress(&self.result)?;
        Ok(residuals)
    }

    /// Evaluation for derivatives; only checks for cancellation
    pub(crate) fn evaluate_quiet(&mut self, params: &Array1<f64>) -> Result<Array1<f64>> {
        self.monitor.check_cancel()?;
        let (_, inside) = self.write_params(params)?;
        if inside {
            Ok(self.model_residuals()?.0)
        } else {
            Ok(self.penalized())
        }
    }

    /// Leave the model at `params` and return the result there
    pub(crate) fn finish(&mut self, params: &Array1<f64>) -> Result<FitResult> {
        let (values, inside) = self.write_params(params)?;
        self.result.pvec = values.to_vec();
        if inside {
            let (residuals, theory) = self.model_residuals()?;
            self.result.theory = theory.to_vec();
            self.result.residuals = residuals.to_vec();
            self.result.fitness = chi_square(&self.result.residuals);
            self.result.constrained_values = self.read_constrained()?;
        }
        Ok(self.result.clone())
    }

    pub(crate) fn has_constraints(&self) -> bool {
        !self.result.constrained_names.is_empty()
    }

    /// Values of the constrained parameters with the free ones at `params`
    ///
    /// NaN for every value when `params` is rejected.
    pub(crate) fn constrained_at(&mut self, params: &Array1<f64>) -> Result<Array1<f64>> {
        self.monitor.check_cancel()?;
        let (_, inside) = self.write_params(params)?;
        if inside {
            Ok(Array1::from(self.read_constrained()?))
        } else {
            Ok(Array1::from_elem(self.result.constrained_names.len(), f64::NAN))
        }
    }

    /// Clamp `params` and write the in-bounds ones into the model
    ///
    /// Returns the clamped values and whether all of them are within bounds.
    /// Constraints are only applied when they are.
    fn write_params(&mut self, params: &Array1<f64>) -> Result<(Array1<f64>, bool)> {
        if params.len() != self.names.len() {
            return Err(FitError::DimensionMismatch(format!(
                "expected {} parameters, got {}",
                self.names.len(),
                params.len()
            )));
        }

        let mut values = Array1::zeros(params.len());
        let mut inside = true;
        for (i, (name, bounds)) in self.names.iter().zip(&self.bounds).enumerate() {
            let value = check_param_range(bounds, params[i]);
            values[i] = value;
            if bounds.is_within_bounds(value) {
                self.model.set_param(name, value)?;
            } else {
                inside = false;
            }
        }

        if inside {
            if let Some(constraints) = self.constraints {
                constraints.apply(&mut *self.model)?;
            }
        }
        Ok((values, inside))
    }

    fn model_residuals(&self) -> Result<(Array1<f64>, Array1<f64>)> {
        let mut residuals = Vec::with_capacity(self.n_points);
        let mut theory = Vec::with_capacity(self.n_points);
        for data in self.datasets {
            let (r, t) = data.residuals(&*self.model)?;
            residuals.extend(r.iter().copied());
            theory.extend(t.iter().copied());
        }
        Ok((Array1::from(residuals), Array1::from(theory)))
    }

    fn read_constrained(&self) -> Result<Vec<f64>> {
        self.result
            .constrained_names
            .iter()
            .map(|name| Ok(self.model.get_param(name)?))
            .collect()
    }

    /// Last good residuals scaled by the penalty factor
    ///
    /// Each magnitude is floored at 1 so a rejected step always scores worse
    /// than an exact fit.
    fn penalized(&self) -> Array1<f64> {
        match &self.last_good {
            Some(residuals) => residuals.mapv(|r| r.abs().max(1.0) * self.penalty),
            None => Array1::from_elem(self.n_points, self.penalty),
        }
    }
}
