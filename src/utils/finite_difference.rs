//! Forward finite-difference Jacobian

use crate::error::{FitError, Result};
use ndarray::{Array1, Array2};

/// Default relative step size
const DEFAULT_EPSILON: f64 = 1e-8;

/// Compute the Jacobian J[i,j] = ∂f_i/∂p_j of `f` at `params` by forward differences
///
/// `residuals` must be `f(params)`; it is passed in because callers have it already.
/// The step for each parameter is `|p_j| * eps`, or `eps` when `p_j` is tiny.
pub fn jacobian<F>(mut f: F, params: &Array1<f64>, residuals: &Array1<f64>, epsilon: Option<f64>) -> Result<Array2<f64>>
where
    F: FnMut(&Array1<f64>) -> Result<Array1<f64>>,
{
    let eps = epsilon.unwrap_or(DEFAULT_EPSILON);
    let n_residuals = residuals.len();
    let mut jac = Array2::zeros((n_residuals, params.len()));

    for j in 0..params.len() {
        let mut perturbed = params.clone();

        // Adapt epsilon to parameter scale
        let eps_j = if params[j].abs() > eps { params[j].abs() * eps } else { eps };
        perturbed[j] += eps_j;

        let shifted = f(&perturbed)?;
        if shifted.len() != n_residuals {
            return Err(FitError::DimensionMismatch(format!(
                "Expected {} residuals, got {}",
                n_residuals,
                shifted.len()
            )));
        }

        for i in 0..n_residuals {
            jac[[i, j]] = (shifted[i] - residuals[i]) / eps_j;
        }
    }

    Ok(jac)
}
