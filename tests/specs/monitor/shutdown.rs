//! Closing a monitor under load

use crate::prelude::*;
use fq_core::test_support::http_task;
use std::sync::atomic::{AtomicBool, Ordering};

#[test]
fn close_releases_every_worker() {
    let monitor = monitor(1);
    for item in 0..1000 {
        monitor.produce(http_task(1, "a.com", item));
    }
    let started = AtomicBool::new(false);

    std::thread::scope(|s| {
        for _ in 0..4 {
            s.spawn(|| loop {
                started.store(true, Ordering::SeqCst);
                match monitor.consume() {
                    Some(task) => {
                        monitor.finish(&task);
                    }
                    None if monitor.is_closed() => break,
                    None => std::thread::yield_now(),
                }
            });
        }
        while !started.load(Ordering::SeqCst) {
            std::thread::yield_now();
        }
        monitor.close();
    });

    assert!(monitor.is_closed());
    assert_eq!(monitor.task_count(), 0);
    assert_eq!(monitor.queue_count(), 0);
    assert!(!monitor.produce(http_task(1, "a.com", 5000)));
}
