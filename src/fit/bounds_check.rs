//! Keeping parameter values inside their bounds during a fit
//!
//! The solver is free to propose any value. Before a value reaches the
//! model it is pulled back inside its bounds; a value that still fails the
//! bound check afterwards (NaN, or a degenerate range) is rejected through
//! the residual penalty instead of being evaluated.

use crate::error::Result;
use crate::parameters::{Bounds, ParameterRegistry};

/// Fraction of a bound's magnitude a value is nudged back by
const NUDGE_FRACTION: f64 = 0.1;

/// Nudge applied at a bound: 10 % of its magnitude, or of 1.0 at zero
fn zero_shift(limit: f64) -> f64 {
    NUDGE_FRACTION * if limit != 0.0 { limit.abs() } else { 1.0 }
}

/// Pull `value` back inside `bounds`
///
/// A value at or below a finite low bound becomes `low + shift(low)`; a
/// value above a finite high bound becomes `high - shift(high)`, or the
/// midpoint of the bounds if that lands below the low bound.
///
/// # Examples
///
/// ```
/// use sasfit_core::fit::check_param_range;
/// use sasfit_core::parameters::Bounds;
///
/// let bounds = Bounds::new(0.0, 10.0).unwrap();
/// assert_eq!(check_param_range(&bounds, 5.0), 5.0);
/// assert_eq!(check_param_range(&bounds, -3.0), 0.1);
/// assert_eq!(check_param_range(&bounds, 12.0), 9.0);
/// ```
pub fn check_param_range(bounds: &Bounds, value: f64) -> f64 {
    let mut value = value;
    let low = bounds.lower();
    let high = bounds.upper();

    if let Some(low) = low {
        if value <= low {
            value = low + zero_shift(low);
        }
    }
    if let Some(high) = high {
        if value > high {
            value = high - zero_shift(high);
            if let Some(low) = low {
                if value < low {
                    value = 0.5 * (low + high);
                }
            }
        }
    }
    value
}

/// Clamp the current values of `names` in `registry` with [`check_param_range`]
pub fn clamp_initial_values<R: ParameterRegistry + ?Sized>(registry: &mut R, names: &[String]) -> Result<()> {
    for name in names {
        let value = registry.get_param(name)?;
        let bounds = registry.get_bounds(name)?;
        let clamped = check_param_range(&bounds, value);
        if clamped != value {
            log::debug!("initial value of {} moved from {} to {}", name, value, clamped);
            registry.set_param(name, clamped)?;
        }
    }
    Ok(())
}

/// Mean of the squared residuals, `None` when there are none
pub fn chi_square(residuals: &[f64]) -> Option<f64> {
    if residuals.is_empty() {
        return None;
    }
    let total: f64 = residuals.iter().map(|r| r * r).sum();
    Some(total / residuals.len() as f64)
}
