//! # Cooperative Work Scheduler
//!
//! A [`CalcScheduler`] runs long computations on a background worker so the
//! host thread never blocks. Work units run one at a time in FIFO order and
//! cooperate through the checkpoints of the [`WorkContext`] they receive:
//!
//! - [`WorkContext::check_cancel`] yields periodically and reports a pending
//!   stop or interrupt as `FitError::Cancelled`
//! - [`WorkContext::update`] sends a progress payload when one is due
//! - [`WorkContext::complete`] delivers the final result
//!
//! Cancellation is cooperative: `stop` and `interrupt` only raise a flag that
//! the unit observes at its next checkpoint. A unit that ends with an error or
//! a panic is handed to the `on_error` callback (or logged when there is
//! none) and reported as [`Completion::Failed`]; the worker moves on to the
//! next unit.
//!
//! Hosts that want results on their own thread forward them from the
//! callbacks, typically through a channel.

pub mod config;
pub mod context;
pub mod worker;

pub use config::SchedulerConfig;
pub use context::{CompleteFn, Completion, ErrorFn, UpdateFn, WorkContext};
pub use worker::{CalcScheduler, ComputeFn, SchedulerBuilder};
