//! Tests for progress updates

use sasfit_core::scheduler::{CalcScheduler, Completion, WorkContext};
use std::time::{Duration, Instant};

use crate::test_helpers::{channel, fast_config};

const TIMEOUT: Duration = Duration::from_secs(10);

/// Calls `update` with a counter until `total` updates were attempted
fn counting(total: u32) -> impl FnMut(u32, &WorkContext<u32, u32>) -> sasfit_core::Result<()> + Send + 'static {
    move |wait_ms: u32, ctx: &WorkContext<u32, u32>| {
        for i in 0..total {
            ctx.update(i)?;
            std::thread::sleep(Duration::from_millis(wait_ms as u64));
        }
        ctx.complete(total);
        Ok(())
    }
}

#[test]
fn test_no_update_without_ready() {
    let (on_update, updates) = channel();
    let (on_complete, completions) = channel();
    let scheduler = CalcScheduler::builder(counting(20))
        .on_update(on_update)
        .on_complete(on_complete)
        .config(fast_config())
        .build();

    scheduler.queue(0);
    assert!(scheduler.wait_idle(TIMEOUT));
    assert_eq!(updates.try_iter().count(), 0);
    assert_eq!(completions.try_iter().collect::<Vec<_>>(), vec![Completion::Done(20)]);
}

#[test]
fn test_ready_allows_a_single_update() {
    let (on_update, updates) = channel();
    let (on_complete, _completions) = channel::<Completion<u32>>();
    let scheduler = CalcScheduler::builder(counting(50))
        .on_update(on_update)
        .on_complete(on_complete)
        .config(fast_config())
        .build();

    scheduler.queue(1);
    scheduler.ready(Duration::ZERO);
    assert!(scheduler.wait_idle(TIMEOUT));
    assert_eq!(updates.try_iter().count(), 1);
}

#[test]
fn test_update_delay_rearms() {
    let (on_update, updates) = channel();
    let (on_complete, _completions) = channel::<Completion<u32>>();
    let config = fast_config().with_update_delay(Duration::from_millis(5));
    let scheduler = CalcScheduler::builder(counting(40))
        .on_update(on_update)
        .on_complete(on_complete)
        .config(config)
        .build();

    scheduler.queue(2);
    assert!(scheduler.wait_idle(TIMEOUT));

    let seen: Vec<u32> = updates.try_iter().collect();
    assert!(seen.len() > 1, "expected repeated updates, got {seen:?}");
    assert!(seen.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn test_interrupt_during_update_loop_terminates_quickly() {
    let (on_complete, completions) = channel();
    let scheduler = CalcScheduler::builder(|_: (), ctx: &WorkContext<u32, u32>| {
        let mut i = 0;
        loop {
            ctx.update(i)?;
            i += 1;
        }
    })
    .on_update(|_| {})
    .on_complete(on_complete)
    .config(fast_config())
    .build();

    scheduler.queue(());
    std::thread::sleep(Duration::from_millis(20));
    let asked = Instant::now();
    scheduler.interrupt();

    let completion = completions.recv_timeout(TIMEOUT).unwrap();
    assert!(completion.is_terminated());
    assert!(asked.elapsed() < Duration::from_secs(1));
}
