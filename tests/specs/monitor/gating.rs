//! Priority gating
//!
//! A less urgent pool waits while more urgent work is still in flight.

use crate::prelude::*;
use fq_core::test_support::http_task;
use fq_core::Priority;
use parking_lot::Mutex;
use std::sync::Arc;

#[test]
fn less_urgent_pool_waits_for_urgent_work() {
    let monitor = monitor(1);
    monitor.produce(http_task(0, "urgent.com", 1));
    monitor.produce(http_task(0, "urgent.com", 2));
    monitor.produce(http_task(5, "later.com", 1));

    let first = monitor.consume().unwrap();
    assert_eq!(first.host(), "urgent.com");

    // urgent.com is at its cap and still pending: later.com is gated
    assert!(monitor.consume().is_none());

    monitor.finish(&first);
    assert_eq!(monitor.consume().unwrap().host(), "urgent.com");
}

#[test]
fn dispatches_never_jump_ahead_of_pending_urgent_work() {
    let monitor = monitor(2);
    for (priority, host) in [(0, "a.com"), (1, "b.com"), (2, "c.com")] {
        for item in 0..20 {
            monitor.produce(http_task(priority, host, item));
        }
    }
    // Every dispatch is checked against the pending set at that moment
    let pending: Arc<Mutex<Vec<Priority>>> = Arc::new(Mutex::new(Vec::new()));
    let violations = Arc::new(Mutex::new(Vec::new()));

    std::thread::scope(|s| {
        for _ in 0..4 {
            s.spawn(|| {
                let mut idle = 0;
                while monitor.task_count() > 0 {
                    // Hold the ledger while dispatching so the view stays consistent
                    let mut held = pending.lock();
                    let Some(task) = monitor.consume() else {
                        drop(held);
                        idle += 1;
                        assert!(idle < SPEC_SPIN_LIMIT, "worker made no progress");
                        std::thread::yield_now();
                        continue;
                    };
                    idle = 0;
                    let p = task.priority();
                    // A new dispatch that is less urgent than something in
                    // flight must not find more urgent pending work behind it
                    if let Some(min) = held.iter().copied().min() {
                        if p.is_less_urgent_than(min) {
                            violations.lock().push((p, min));
                        }
                    }
                    held.push(p);
                    drop(held);

                    std::thread::yield_now();

                    let mut held = pending.lock();
                    if let Some(i) = held.iter().position(|q| *q == p) {
                        held.swap_remove(i);
                    }
                    monitor.finish(&task);
                    drop(held);
                }
            });
        }
    });

    assert!(violations.lock().is_empty(), "gating violated: {:?}", violations.lock());
    assert_eq!(monitor.finished_task_count(), 60);
}
