//! Running fits on a background worker

use std::sync::Arc;
use std::time::Duration;

use crate::fit::engine::FitEngine;
use crate::fit::result::FitResult;
use crate::scheduler::{CalcScheduler, Completion, SchedulerConfig, WorkContext};

/// A configured engine whose selected problem should be fitted
pub type FitJob = Arc<FitEngine>;

/// Fits queued engines one after another off the caller's thread
///
/// Intermediate results go to the progress callback (paced by `ready`), the
/// final result to the completion callback as [`Completion::Done`]. A fit
/// stopped through `stop`, `interrupt` or `reset` completes as
/// [`Completion::Terminated`]; a fit that fails completes as
/// [`Completion::Failed`].
pub struct FitThread {
    scheduler: CalcScheduler<FitJob, FitResult, FitResult>,
}

impl FitThread {
    pub fn new<P, D>(config: SchedulerConfig, on_progress: P, on_complete: D) -> Self
    where
        P: Fn(FitResult) + Send + Sync + 'static,
        D: Fn(Completion<FitResult>) + Send + Sync + 'static,
    {
        let scheduler = CalcScheduler::builder(run_fit)
            .on_update(on_progress)
            .on_complete(on_complete)
            .config(config)
            .build();
        Self { scheduler }
    }

    pub fn queue(&self, job: FitJob) {
        self.scheduler.queue(job);
    }

    pub fn requeue(&self, job: FitJob) {
        self.scheduler.requeue(job);
    }

    pub fn reset(&self, job: FitJob) {
        self.scheduler.reset(job);
    }

    pub fn stop(&self) {
        self.scheduler.stop();
    }

    pub fn interrupt(&self) {
        self.scheduler.interrupt();
    }

    pub fn ready(&self, delay: Duration) {
        self.scheduler.ready(delay);
    }

    pub fn is_running(&self) -> bool {
        self.scheduler.is_running()
    }

    pub fn wait_idle(&self, timeout: Duration) -> bool {
        self.scheduler.wait_idle(timeout)
    }

    pub fn scheduler(&self) -> &CalcScheduler<FitJob, FitResult, FitResult> {
        &self.scheduler
    }
}

fn run_fit(engine: FitJob, ctx: &WorkContext<FitResult, FitResult>) -> crate::Result<()> {
    let result = engine.fit(ctx)?;
    ctx.complete(result);
    Ok(())
}
