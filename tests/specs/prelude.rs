//! Test helpers for scheduler specifications.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, dead_code)]

use fq_core::{FakeClock, FetchTask, GroupMode, PoolKey};
use fq_engine::{FetchTaskTracker, MonitorConfig, TaskMonitor};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

// Spec polling limits
pub const SPEC_SPIN_LIMIT: usize = 200_000;

pub type Monitor = Arc<TaskMonitor<FakeClock>>;

/// Monitor with no politeness delay and `pool_threads` slots per pool
pub fn monitor(pool_threads: usize) -> Monitor {
    let config = MonitorConfig {
        pool_threads,
        crawl_delay: Duration::ZERO,
        ..MonitorConfig::default()
    };
    let tracker = Arc::new(FetchTaskTracker::new(GroupMode::Host, 3));
    Arc::new(TaskMonitor::new("spec", config, tracker, FakeClock::new()))
}

/// Records what workers observe so specs can assert on it afterwards
#[derive(Default)]
pub struct Ledger {
    in_flight: Mutex<HashMap<PoolKey, usize>>,
    dispatched: Mutex<HashSet<(PoolKey, u64)>>,
    peak: Mutex<HashMap<PoolKey, usize>>,
    duplicates: Mutex<Vec<(PoolKey, u64)>>,
}

impl Ledger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Call right after `consume` returns a task
    pub fn begin(&self, task: &FetchTask) {
        let key = task.key();
        if !self
            .dispatched
            .lock()
            .insert((key.clone(), task.item_id().0))
        {
            self.duplicates.lock().push((key.clone(), task.item_id().0));
        }
        let mut in_flight = self.in_flight.lock();
        let n = in_flight.entry(key.clone()).or_default();
        *n += 1;
        let mut peak = self.peak.lock();
        let p = peak.entry(key).or_default();
        *p = (*p).max(*n);
    }

    /// Call right before acknowledging a task
    pub fn end(&self, task: &FetchTask) {
        if let Some(n) = self.in_flight.lock().get_mut(&task.key()) {
            *n -= 1;
        }
    }

    pub fn dispatched(&self) -> usize {
        self.dispatched.lock().len()
    }

    pub fn duplicates(&self) -> Vec<(PoolKey, u64)> {
        self.duplicates.lock().clone()
    }

    pub fn peak(&self) -> usize {
        self.peak.lock().values().copied().max().unwrap_or(0)
    }
}

/// Run `threads` workers that consume, record, and finish until `done`
/// returns true. Panics if the workers spin without making progress.
pub fn run_workers(
    monitor: &Monitor,
    ledger: &Arc<Ledger>,
    threads: usize,
    done: impl Fn(&TaskMonitor<FakeClock>) -> bool + Sync,
) {
    std::thread::scope(|s| {
        for _ in 0..threads {
            s.spawn(|| {
                let mut idle = 0;
                while !done(monitor) {
                    match monitor.consume() {
                        Some(task) => {
                            idle = 0;
                            ledger.begin(&task);
                            std::thread::yield_now();
                            ledger.end(&task);
                            monitor.finish(&task);
                        }
                        None => {
                            idle += 1;
                            assert!(idle < SPEC_SPIN_LIMIT, "worker made no progress");
                            std::thread::yield_now();
                        }
                    }
                }
            });
        }
    });
}
