//! Tests for the work queue

use sasfit_core::scheduler::{CalcScheduler, Completion, WorkContext};
use std::sync::mpsc;
use std::sync::Mutex;
use std::time::Duration;

use crate::test_helpers::{channel, fast_config};

const TIMEOUT: Duration = Duration::from_secs(10);

/// A unit that either finishes at once or spins until cancelled
#[derive(Debug, Clone, Copy, PartialEq)]
enum Unit {
    Quick(u32),
    Block(u32),
}

/// Scheduler over `Unit`s that reports every start on `started`
fn scheduler(
    started: mpsc::Sender<u32>,
) -> (CalcScheduler<Unit, (), u32>, mpsc::Receiver<Completion<u32>>) {
    let started = Mutex::new(started);
    let (on_complete, completions) = channel();
    let scheduler = CalcScheduler::builder(move |unit: Unit, ctx: &WorkContext<(), u32>| {
        let id = match unit {
            Unit::Quick(id) | Unit::Block(id) => id,
        };
        if let Ok(started) = started.lock() {
            let _ = started.send(id);
        }
        if let Unit::Block(_) = unit {
            loop {
                ctx.check_cancel()?;
                std::thread::sleep(Duration::from_millis(1));
            }
        }
        ctx.complete(id);
        Ok(())
    })
    .on_complete(on_complete)
    .config(fast_config())
    .build();
    (scheduler, completions)
}

#[test]
fn test_units_complete_in_queue_order() {
    let (tx, started) = mpsc::channel();
    let (scheduler, completions) = scheduler(tx);

    scheduler.queue(Unit::Quick(1));
    scheduler.queue(Unit::Quick(2));
    assert!(scheduler.wait_idle(TIMEOUT));

    let done: Vec<u32> = completions.try_iter().filter_map(Completion::into_done).collect();
    assert_eq!(done, vec![1, 2]);
    assert_eq!(started.try_iter().collect::<Vec<_>>(), vec![1, 2]);
}

#[test]
fn test_requeue_replaces_pending_unit() {
    let (tx, started) = mpsc::channel();
    let (scheduler, completions) = scheduler(tx);

    scheduler.queue(Unit::Block(1));
    assert_eq!(started.recv_timeout(TIMEOUT).unwrap(), 1);

    scheduler.queue(Unit::Quick(2));
    scheduler.requeue(Unit::Quick(3));
    assert_eq!(scheduler.pending(), 1);

    scheduler.interrupt();
    assert!(scheduler.wait_idle(TIMEOUT));

    let completions: Vec<Completion<u32>> = completions.try_iter().collect();
    assert_eq!(completions.len(), 2);
    assert!(completions[0].is_terminated());
    assert_eq!(completions[1], Completion::Done(3));
    assert_eq!(started.try_iter().collect::<Vec<_>>(), vec![3]);
}

#[test]
fn test_stop_terminates_running_and_drops_pending() {
    let (tx, started) = mpsc::channel();
    let (scheduler, completions) = scheduler(tx);

    scheduler.queue(Unit::Block(1));
    assert_eq!(started.recv_timeout(TIMEOUT).unwrap(), 1);
    scheduler.queue(Unit::Quick(2));

    scheduler.stop();
    assert!(scheduler.wait_idle(TIMEOUT));

    let completions: Vec<Completion<u32>> = completions.try_iter().collect();
    assert_eq!(completions, vec![Completion::Terminated]);
    assert!(started.try_iter().next().is_none());
}

#[test]
fn test_reset_runs_only_the_new_unit() {
    let (tx, started) = mpsc::channel();
    let (scheduler, completions) = scheduler(tx);

    scheduler.queue(Unit::Block(1));
    assert_eq!(started.recv_timeout(TIMEOUT).unwrap(), 1);
    scheduler.queue(Unit::Quick(2));

    scheduler.reset(Unit::Quick(3));
    assert!(scheduler.wait_idle(TIMEOUT));

    let completions: Vec<Completion<u32>> = completions.try_iter().collect();
    assert_eq!(completions, vec![Completion::Terminated, Completion::Done(3)]);
}

#[test]
fn test_worker_restarts_after_idle() {
    let (tx, _started) = mpsc::channel();
    let (scheduler, completions) = scheduler(tx);

    scheduler.queue(Unit::Quick(1));
    assert!(scheduler.wait_idle(TIMEOUT));
    assert!(!scheduler.is_running());

    scheduler.queue(Unit::Quick(2));
    assert!(scheduler.wait_idle(TIMEOUT));

    let done: Vec<u32> = completions.try_iter().filter_map(Completion::into_done).collect();
    assert_eq!(done, vec![1, 2]);
}
