//! The scheduler handle and its background worker

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use super::config::SchedulerConfig;
use super::context::{CompleteFn, Completion, ErrorFn, Signals, UpdateFn, WorkContext};
use crate::error::{FitError, Result};
use crate::utils::lock;

/// Body run for every work unit
pub type ComputeFn<W, U, C> = Box<dyn FnMut(W, &WorkContext<U, C>) -> Result<()> + Send>;

/// Pending units and the running flag, guarded together
struct Queue<W> {
    pending: VecDeque<W>,
    running: bool,
}

struct Shared<W, U, C> {
    queue: Mutex<Queue<W>>,
    idle: Condvar,
    compute: Mutex<ComputeFn<W, U, C>>,
    signals: Arc<Signals<U, C>>,
}

/// Runs work units one at a time on a background thread
///
/// `W` is the work unit, `U` the progress payload and `C` the completion
/// payload. Units run strictly in FIFO order. A worker thread is started
/// when work is queued on an idle scheduler and exits once the queue is
/// drained. Callbacks run on the worker thread.
pub struct CalcScheduler<W, U, C> {
    shared: Arc<Shared<W, U, C>>,
}

/// Builder for [`CalcScheduler`]
pub struct SchedulerBuilder<W, U, C> {
    compute: ComputeFn<W, U, C>,
    on_update: Option<UpdateFn<U>>,
    on_complete: Option<CompleteFn<C>>,
    on_error: Option<ErrorFn>,
    config: SchedulerConfig,
}

impl<W, U, C> SchedulerBuilder<W, U, C>
where
    W: Send + 'static,
    U: 'static,
    C: 'static,
{
    /// Callback receiving progress payloads from `update`
    pub fn on_update<F>(mut self, f: F) -> Self
    where
        F: Fn(U) + Send + Sync + 'static,
    {
        self.on_update = Some(Box::new(f));
        self
    }

    /// Callback receiving the completion of every unit
    pub fn on_complete<F>(mut self, f: F) -> Self
    where
        F: Fn(Completion<C>) + Send + Sync + 'static,
    {
        self.on_complete = Some(Box::new(f));
        self
    }

    /// Callback receiving the error of every unit that fails or panics
    ///
    /// Runs before the unit's `Failed` completion. Without it failures are
    /// logged. Cancellation is not an error and never reaches it.
    pub fn on_error<F>(mut self, f: F) -> Self
    where
        F: Fn(&FitError) + Send + Sync + 'static,
    {
        self.on_error = Some(Box::new(f));
        self
    }

    pub fn config(mut self, config: SchedulerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> CalcScheduler<W, U, C> {
        let signals = Signals {
            interrupting: AtomicBool::new(false),
            next_update: Mutex::new(None),
            on_update: self.on_update,
            on_complete: self.on_complete,
            on_error: self.on_error,
            config: self.config,
        };
        CalcScheduler {
            shared: Arc::new(Shared {
                queue: Mutex::new(Queue {
                    pending: VecDeque::new(),
                    running: false,
                }),
                idle: Condvar::new(),
                compute: Mutex::new(self.compute),
                signals: Arc::new(signals),
            }),
        }
    }
}

impl<W, U, C> CalcScheduler<W, U, C>
where
    W: Send + 'static,
    U: Send + 'static,
    C: Send + 'static,
{
    /// Start building a scheduler around `compute`
    ///
    /// # Examples
    ///
    /// ```
    /// use std::sync::mpsc;
    /// use std::time::Duration;
    /// use sasfit_core::scheduler::CalcScheduler;
    ///
    /// let (tx, rx) = mpsc::channel();
    /// let tx = std::sync::Mutex::new(tx);
    /// let scheduler = CalcScheduler::builder(|n: u64, ctx| {
    ///     let mut total = 0;
    ///     for i in 0..n {
    ///         ctx.check_cancel()?;
    ///         total += i;
    ///     }
    ///     ctx.complete(total);
    ///     Ok(())
    /// })
    /// .on_update(|_: ()| {})
    /// .on_complete(move |c| { let _ = tx.lock().unwrap().send(c); })
    /// .build();
    ///
    /// scheduler.queue(100);
    /// let done = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    /// assert_eq!(done.into_done(), Some(4950));
    /// ```
    pub fn builder<F>(compute: F) -> SchedulerBuilder<W, U, C>
    where
        F: FnMut(W, &WorkContext<U, C>) -> Result<()> + Send + 'static,
    {
        SchedulerBuilder {
            compute: Box::new(compute),
            on_update: None,
            on_complete: None,
            on_error: None,
            config: SchedulerConfig::default(),
        }
    }

    /// Append a unit; starts the worker if it is idle
    pub fn queue(&self, work: W) {
        let start = {
            let mut queue = lock(&self.shared.queue);
            queue.pending.push_back(work);
            !std::mem::replace(&mut queue.running, true)
        };
        if start {
            self.start_worker();
        }
    }

    /// Replace the most recently queued unit that has not started yet
    ///
    /// With nothing pending this is the same as `queue`.
    pub fn requeue(&self, work: W) {
        let start = {
            let mut queue = lock(&self.shared.queue);
            queue.pending.pop_back();
            queue.pending.push_back(work);
            !std::mem::replace(&mut queue.running, true)
        };
        if start {
            self.start_worker();
        }
    }

    /// Discard all pending work, abort the running unit, then queue `work`
    pub fn reset(&self, work: W) {
        self.stop();
        self.queue(work);
    }

    /// Clear the queue and ask the running unit to stop at its next checkpoint
    pub fn stop(&self) {
        let mut queue = lock(&self.shared.queue);
        let dropped = queue.pending.len();
        queue.pending.clear();
        self.shared.signals.interrupting.store(true, Ordering::SeqCst);
        if dropped > 0 {
            log::debug!("stop discarded {} pending work unit(s)", dropped);
        }
    }

    /// Ask only the running unit to stop; pending units still run
    pub fn interrupt(&self) {
        let _queue = lock(&self.shared.queue);
        self.shared.signals.interrupting.store(true, Ordering::SeqCst);
    }

    /// Allow the next progress update once `delay` has elapsed
    pub fn ready(&self, delay: Duration) {
        *lock(&self.shared.signals.next_update) = Some(Instant::now() + delay);
    }

    pub fn is_running(&self) -> bool {
        lock(&self.shared.queue).running
    }

    /// Number of units waiting to start
    pub fn pending(&self) -> usize {
        lock(&self.shared.queue).pending.len()
    }

    /// Block until the worker has drained the queue, or `timeout` passes
    ///
    /// Returns true if the scheduler is idle.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let queue = lock(&self.shared.queue);
        let (queue, _) = self
            .shared
            .idle
            .wait_timeout_while(queue, timeout, |q| q.running)
            .unwrap_or_else(|e| e.into_inner());
        !queue.running
    }

    fn start_worker(&self) {
        self.shared.signals.rearm();

        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name("calc-worker".to_string())
            .spawn(move || run(shared));

        if let Err(e) = spawned {
            log::error!("failed to start calc worker: {}", e);
            let mut queue = lock(&self.shared.queue);
            queue.running = false;
            self.shared.idle.notify_all();
        }
    }
}

impl<W, U, C> Drop for CalcScheduler<W, U, C> {
    fn drop(&mut self) {
        let mut queue = lock(&self.shared.queue);
        queue.pending.clear();
        self.shared.signals.interrupting.store(true, Ordering::SeqCst);
    }
}

/// Worker loop: pop units until the queue is empty
fn run<W, U, C>(shared: Arc<Shared<W, U, C>>) {
    log::debug!("calc worker started");

    loop {
        let work = {
            let mut queue = lock(&shared.queue);
            match queue.pending.pop_front() {
                Some(work) => {
                    shared.signals.interrupting.store(false, Ordering::SeqCst);
                    work
                }
                None => {
                    queue.running = false;
                    shared.idle.notify_all();
                    break;
                }
            }
        };

        let context = WorkContext::new(Arc::clone(&shared.signals));
        let outcome = {
            let mut compute = lock(&shared.compute);
            panic::catch_unwind(AssertUnwindSafe(|| (*compute)(work, &context)))
        };

        if panic::catch_unwind(AssertUnwindSafe(|| context.finish(outcome))).is_err() {
            log::error!("completion callback panicked");
        }
    }

    log::debug!("calc worker finished");
}
