//! Many workers, one monitor
//!
//! Verify the per-pool cap and single dispatch hold under contention.

use crate::prelude::*;
use fq_core::test_support::http_task;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const HOSTS: [&str; 4] = ["a.com", "b.com", "c.com", "d.com"];

#[test]
fn cap_is_never_exceeded_under_contention() {
    let monitor = monitor(2);
    for (i, host) in HOSTS.iter().enumerate() {
        for item in 0..25 {
            assert!(monitor.produce(http_task(1, host, (i * 100 + item) as u64)));
        }
    }
    let ledger = Ledger::new();

    run_workers(&monitor, &ledger, 8, |m| m.task_count() == 0);

    assert!(ledger.peak() <= 2, "cap exceeded: {}", ledger.peak());
    assert!(ledger.duplicates().is_empty(), "double dispatch: {:?}", ledger.duplicates());
    assert_eq!(ledger.dispatched(), 100);
    assert_eq!(monitor.finished_task_count(), 100);
}

#[test]
fn single_slot_pools_serialize_their_hosts() {
    let monitor = monitor(1);
    for (i, host) in HOSTS.iter().enumerate() {
        for item in 0..10 {
            monitor.produce(http_task(0, host, (i * 100 + item) as u64));
        }
    }
    let ledger = Ledger::new();

    run_workers(&monitor, &ledger, 6, |m| m.task_count() == 0);

    assert_eq!(ledger.peak(), 1);
    assert_eq!(ledger.dispatched(), 40);
}

#[test]
fn producers_and_consumers_run_together() {
    let monitor = monitor(2);
    let ledger = Ledger::new();

    std::thread::scope(|s| {
        let producers: Vec<_> = HOSTS
            .iter()
            .enumerate()
            .map(|(i, &host)| {
                let monitor = Arc::clone(&monitor);
                s.spawn(move || {
                    for item in 0..50 {
                        monitor.produce(http_task(1, host, (i * 1000 + item) as u64));
                    }
                })
            })
            .collect();

        let consumers = {
            let monitor = Arc::clone(&monitor);
            let ledger = Arc::clone(&ledger);
            s.spawn(move || {
                run_workers(&monitor, &ledger, 4, |m| {
                    m.is_feeder_completed() && m.task_count() == 0
                })
            })
        };

        for producer in producers {
            producer.join().unwrap();
        }
        monitor.set_feeder_completed();
        consumers.join().unwrap();
    });

    assert!(ledger.duplicates().is_empty());
    assert_eq!(monitor.finished_task_count(), 200);
    assert!(ledger.peak() <= 2);
}

#[test]
fn only_one_finish_wins() {
    let monitor = monitor(1);
    monitor.produce(http_task(1, "a.com", 1));
    let task = monitor.consume().unwrap();
    let wins = AtomicUsize::new(0);

    std::thread::scope(|s| {
        for _ in 0..8 {
            s.spawn(|| {
                if monitor.finish(&task) {
                    wins.fetch_add(1, Ordering::SeqCst);
                }
            });
        }
    });

    assert_eq!(wins.load(Ordering::SeqCst), 1);
    assert_eq!(monitor.finished_task_count(), 1);
    assert_eq!(monitor.pending_task_count(), 0);
}
