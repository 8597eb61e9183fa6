//! One-dimensional data set to fit
//!
//! Points outside the fit range `[qmin, qmax]` and points with zero
//! uncertainty do not take part in the fit.

use ndarray::Array1;

use crate::error::{FitError, Result};
use crate::fit::model::FitModel;

/// Samples `x`, observations `y` and uncertainties `dy` of equal length
#[derive(Debug, Clone, PartialEq)]
pub struct FitData {
    x: Array1<f64>,
    y: Array1<f64>,
    dy: Array1<f64>,
    qmin: f64,
    qmax: f64,
    /// Points taking part in the fit
    mask: Vec<bool>,
}

impl FitData {
    /// Create a data set
    ///
    /// Missing or all-zero uncertainties are replaced by ones. A first point at
    /// `x == 0` with a non-finite observation is left out of the default range.
    ///
    /// # Examples
    ///
    /// ```
    /// use ndarray::array;
    /// use sasfit_core::fit::FitData;
    ///
    /// let data = FitData::new(array![0.0, 1.0, 2.0], array![f64::NAN, 3.0, 5.0], None).unwrap();
    /// assert_eq!(data.fit_range(), (1.0, 2.0));
    /// assert_eq!(data.n_fit_points(), 2);
    /// ```
    pub fn new(x: Array1<f64>, y: Array1<f64>, dy: Option<Array1<f64>>) -> Result<Self> {
        if x.is_empty() {
            return Err(FitError::Configuration("data set has no points".to_string()));
        }
        if y.len() != x.len() {
            return Err(FitError::DimensionMismatch(format!(
                "x has {} points but y has {}",
                x.len(),
                y.len()
            )));
        }

        let dy = match dy {
            Some(dy) if dy.len() != x.len() => {
                return Err(FitError::DimensionMismatch(format!(
                    "x has {} points but dy has {}",
                    x.len(),
                    dy.len()
                )));
            }
            Some(dy) if dy.iter().any(|&e| e != 0.0) => dy,
            _ => Array1::ones(x.len()),
        };

        let qmin = if x[0] == 0.0 && min(&x) == 0.0 && !y[0].is_finite() {
            min_nonzero(&x)
        } else {
            min(&x)
        };
        let qmax = max(&x);

        let mut data = Self {
            x,
            y,
            dy,
            qmin,
            qmax,
            mask: Vec::new(),
        };
        data.update_mask();
        Ok(data)
    }

    /// Create a data set from plain vectors
    pub fn from_vecs(x: Vec<f64>, y: Vec<f64>, dy: Option<Vec<f64>>) -> Result<Self> {
        Self::new(Array1::from(x), Array1::from(y), dy.map(Array1::from))
    }

    /// Restrict the fit to `[qmin, qmax]`; `None` keeps the current limit
    pub fn set_fit_range(&mut self, qmin: Option<f64>, qmax: Option<f64>) {
        match qmin {
            Some(q) if q == 0.0 && !self.y[0].is_finite() => self.qmin = min_nonzero(&self.x),
            Some(q) => self.qmin = q,
            None => {}
        }
        if let Some(q) = qmax {
            self.qmax = q;
        }
        self.update_mask();
    }

    pub fn fit_range(&self) -> (f64, f64) {
        (self.qmin, self.qmax)
    }

    pub fn x(&self) -> &Array1<f64> {
        &self.x
    }

    pub fn y(&self) -> &Array1<f64> {
        &self.y
    }

    pub fn dy(&self) -> &Array1<f64> {
        &self.dy
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Which points take part in the fit
    pub fn mask(&self) -> &[bool] {
        &self.mask
    }

    pub fn n_fit_points(&self) -> usize {
        self.mask.iter().filter(|&&m| m).count()
    }

    /// Samples inside the fit range
    pub fn fit_x(&self) -> Array1<f64> {
        self.select(&self.x)
    }

    /// `(y - f(x)) / dy` over the fitted points, and the theory `f(x)` itself
    pub fn residuals<M: FitModel + ?Sized>(&self, model: &M) -> Result<(Array1<f64>, Array1<f64>)> {
        let x = self.fit_x();
        let theory = model.eval(&x)?;
        if theory.len() != x.len() {
            return Err(FitError::DimensionMismatch(format!(
                "model '{}' returned {} values for {} points",
                model.name(),
                theory.len(),
                x.len()
            )));
        }

        let y = self.select(&self.y);
        let dy = self.select(&self.dy);
        let residuals = (&y - &theory) / &dy;
        Ok((residuals, theory))
    }

    fn select(&self, values: &Array1<f64>) -> Array1<f64> {
        values
            .iter()
            .zip(&self.mask)
            .filter_map(|(&v, &keep)| keep.then_some(v))
            .collect()
    }

    fn update_mask(&mut self) {
        self.mask = self
            .x
            .iter()
            .zip(self.dy.iter())
            .map(|(&x, &dy)| x >= self.qmin && x <= self.qmax && dy != 0.0)
            .collect();
    }
}

fn min(values: &Array1<f64>) -> f64 {
    values.iter().copied().fold(f64::INFINITY, f64::min)
}

fn max(values: &Array1<f64>) -> f64 {
    values.iter().copied().fold(f64::NEG_INFINITY, f64::max)
}

fn min_nonzero(values: &Array1<f64>) -> f64 {
    values
        .iter()
        .copied()
        .filter(|&v| v != 0.0)
        .fold(f64::INFINITY, f64::min)
}
