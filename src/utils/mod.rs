//! Utility functions shared by the scheduler and the fit engine

pub mod finite_difference;
pub mod matrix_convert;

pub use finite_difference::jacobian;
pub use matrix_convert::{nalgebra_to_ndarray, nalgebra_vec_to_ndarray, ndarray_to_nalgebra, ndarray_vec_to_nalgebra};

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock a mutex, taking over the data if a previous holder panicked
pub(crate) fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
