//! Checkpoints available to a running work unit

use std::any::Any;
use std::cell::Cell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Instant;

use super::config::SchedulerConfig;
use crate::error::{FitError, Result};
use crate::utils::lock;

/// Progress callback
pub type UpdateFn<U> = Box<dyn Fn(U) + Send + Sync>;

/// Completion callback
pub type CompleteFn<C> = Box<dyn Fn(Completion<C>) + Send + Sync>;

/// Error callback, for units that fail or panic
pub type ErrorFn = Box<dyn Fn(&FitError) + Send + Sync>;

/// How a work unit ended, as seen by the completion callback
#[derive(Debug, Clone, PartialEq)]
pub enum Completion<C> {
    /// The unit called `complete` with this payload
    Done(C),

    /// The unit was stopped or interrupted before completing
    Terminated,

    /// The unit returned an error or panicked before completing
    Failed(String),
}

impl<C> Completion<C> {
    pub fn is_done(&self) -> bool {
        matches!(self, Completion::Done(_))
    }

    pub fn is_terminated(&self) -> bool {
        matches!(self, Completion::Terminated)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Completion::Failed(_))
    }

    /// The payload of a completed unit
    pub fn into_done(self) -> Option<C> {
        match self {
            Completion::Done(payload) => Some(payload),
            _ => None,
        }
    }
}

/// State shared between the scheduler handle and the running unit
pub(crate) struct Signals<U, C> {
    pub(crate) interrupting: AtomicBool,
    pub(crate) next_update: Mutex<Option<Instant>>,
    pub(crate) on_update: Option<UpdateFn<U>>,
    pub(crate) on_complete: Option<CompleteFn<C>>,
    pub(crate) on_error: Option<ErrorFn>,
    pub(crate) config: SchedulerConfig,
}

impl<U, C> Signals<U, C> {
    /// Arm the next update `config.update_delay` from now, or disarm it
    pub(crate) fn rearm(&self) {
        *lock(&self.next_update) = self.config.update_delay.map(|delay| Instant::now() + delay);
    }

    fn emit(&self, completion: Completion<C>) {
        if let Some(on_complete) = &self.on_complete {
            on_complete(completion);
        }
    }

    /// Hand `error` to the error callback, or log it when there is none
    ///
    /// A panicking callback is logged along with the error it was given.
    fn report(&self, error: &FitError) {
        if let Some(on_error) = &self.on_error {
            match panic::catch_unwind(AssertUnwindSafe(|| on_error(error))) {
                Ok(()) => return,
                Err(panic) => log::error!("error callback panicked: {}", panic_message(panic.as_ref())),
            }
        }
        log::error!("work unit failed: {}", error);
    }
}

/// Handle passed to the compute body of a work unit
///
/// All checkpoints must be called from the worker running the unit.
pub struct WorkContext<U, C> {
    signals: Arc<Signals<U, C>>,
    next_nap: Cell<Instant>,
    completed: Cell<bool>,
}

impl<U, C> WorkContext<U, C> {
    pub(crate) fn new(signals: Arc<Signals<U, C>>) -> Self {
        let next_nap = Instant::now() + signals.config.work_time;
        Self {
            signals,
            next_nap: Cell::new(next_nap),
            completed: Cell::new(false),
        }
    }

    /// True once `stop` or `interrupt` has been requested for this unit
    pub fn is_cancelled(&self) -> bool {
        self.signals.interrupting.load(Ordering::SeqCst)
    }

    /// Cooperative checkpoint
    ///
    /// Yields the thread once every `work_time` of computation, then returns
    /// `FitError::Cancelled` if the unit has been asked to stop. Compute
    /// bodies propagate the error with `?`.
    pub fn check_cancel(&self) -> Result<()> {
        let config = &self.signals.config;
        let now = Instant::now();
        if !config.yield_time.is_zero() && now >= self.next_nap.get() {
            thread::sleep(config.yield_time);
            self.next_nap.set(Instant::now() + config.work_time);
        }
        if self.is_cancelled() {
            return Err(FitError::Cancelled);
        }
        Ok(())
    }

    /// Report progress if an update is due, otherwise just check for cancellation
    pub fn update(&self, payload: U) -> Result<()> {
        self.update_with(|| payload)
    }

    /// Like [`update`](Self::update), building the payload only when an update is due
    pub fn update_with<F>(&self, payload: F) -> Result<()>
    where
        F: FnOnce() -> U,
    {
        let Some(on_update) = &self.signals.on_update else {
            return self.check_cancel();
        };

        let due = {
            let mut next_update = lock(&self.signals.next_update);
            match *next_update {
                Some(at) if Instant::now() >= at => {
                    *next_update = self.signals.config.update_delay.map(|delay| Instant::now() + delay);
                    true
                }
                _ => false,
            }
        };
        if !due {
            return self.check_cancel();
        }

        on_update(payload());
        thread::sleep(self.signals.config.yield_time);
        if self.is_cancelled() {
            return Err(FitError::Cancelled);
        }
        Ok(())
    }

    /// Deliver the final result of this unit
    ///
    /// Only the first call has an effect.
    pub fn complete(&self, payload: C) {
        if self.completed.replace(true) {
            log::warn!("work unit completed more than once, ignoring");
            return;
        }
        self.signals.emit(Completion::Done(payload));
        thread::sleep(self.signals.config.yield_time);
    }

    pub fn is_completed(&self) -> bool {
        self.completed.get()
    }

    /// Report how the compute body ended, unless it already completed
    pub(crate) fn finish(&self, outcome: thread::Result<Result<()>>) {
        let completion = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(e)) if e.is_cancelled() => {
                log::info!("work unit terminated");
                Some(Completion::Terminated)
            }
            Ok(Err(e)) => {
                self.signals.report(&e);
                Some(Completion::Failed(e.to_string()))
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                self.signals.report(&FitError::Other(format!("work unit panicked: {}", message)));
                Some(Completion::Failed(message))
            }
        };

        if let Some(completion) = completion {
            if !self.completed.replace(true) {
                self.signals.emit(completion);
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "work unit panicked".to_string()
    }
}
