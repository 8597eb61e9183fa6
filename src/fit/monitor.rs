//! Progress reporting and cancellation for a running fit

use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{FitError, Result};
use crate::fit::result::FitResult;
use crate::scheduler::WorkContext;

/// Observer of a running fit
///
/// The fit calls `progress` after every residual evaluation the solver asks
/// for, and `check_cancel` on every other evaluation. Returning
/// `FitError::Cancelled` from either stops the fit.
pub trait FitMonitor {
    fn check_cancel(&self) -> Result<()> {
        Ok(())
    }

    fn progress(&self, _result: &FitResult) -> Result<()> {
        self.check_cancel()
    }
}

/// Runs the fit to the end without reporting
impl FitMonitor for () {}

/// An abort flag the host can raise from any thread
impl FitMonitor for AtomicBool {
    fn check_cancel(&self) -> Result<()> {
        if self.load(Ordering::SeqCst) {
            Err(FitError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// A fit running as a scheduler work unit reports through its checkpoints
impl<C> FitMonitor for WorkContext<FitResult, C> {
    fn check_cancel(&self) -> Result<()> {
        WorkContext::check_cancel(self)
    }

    fn progress(&self, result: &FitResult) -> Result<()> {
        self.update_with(|| result.clone())
    }
}
