// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fetch workers.
//!
//! Each worker is a named OS thread that loops `consume` → fetch →
//! acknowledge until told to stop. Fetching itself sits behind the
//! [`Fetcher`] trait.

use fq_core::{Clock, FetchTask};
use fq_engine::TaskMonitor;
use std::ops::AddAssign;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::lifecycle::LifecycleError;

/// Result of fetching one task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    Success,
    /// Failed; the task is dropped without waiting out the politeness delay
    Failed,
    /// Failed in a way that counts against the host's reachability
    HostUnreachable,
}

pub trait Fetcher: Send + Sync {
    fn fetch(&self, task: &FetchTask) -> FetchOutcome;
}

/// Pretends every fetch succeeds after a fixed latency
#[derive(Debug, Clone, Default)]
pub struct DryRunFetcher {
    latency: Duration,
}

impl DryRunFetcher {
    pub fn new(latency: Duration) -> Self {
        Self { latency }
    }
}

impl Fetcher for DryRunFetcher {
    fn fetch(&self, task: &FetchTask) -> FetchOutcome {
        if !self.latency.is_zero() {
            std::thread::sleep(self.latency);
        }
        tracing::debug!(url = task.url(), "dry-run fetch");
        FetchOutcome::Success
    }
}

/// Per-worker tallies
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub fetched: usize,
    pub failed: usize,
    pub unreachable: usize,
}

impl WorkerStats {
    pub fn total(&self) -> usize {
        self.fetched + self.failed + self.unreachable
    }
}

impl AddAssign for WorkerStats {
    fn add_assign(&mut self, other: Self) {
        self.fetched += other.fetched;
        self.failed += other.failed;
        self.unreachable += other.unreachable;
    }
}

/// Work until `stop` is set or the monitor closes.
///
/// Sleeps for `idle` whenever the monitor has nothing to hand out.
pub fn run_worker<C: Clock>(
    monitor: &TaskMonitor<C>,
    fetcher: &dyn Fetcher,
    stop: &AtomicBool,
    idle: Duration,
) -> WorkerStats {
    let mut stats = WorkerStats::default();

    while !stop.load(Ordering::SeqCst) {
        let Some(task) = monitor.consume() else {
            if monitor.is_closed() {
                break;
            }
            std::thread::sleep(idle);
            continue;
        };

        match fetcher.fetch(&task) {
            FetchOutcome::Success => {
                monitor.track_success(task.page());
                monitor.finish(&task);
                stats.fetched += 1;
            }
            FetchOutcome::Failed => {
                monitor.finish_asap(&task);
                stats.failed += 1;
            }
            FetchOutcome::HostUnreachable => {
                monitor.finish_asap(&task);
                if monitor.track_host_gone(task.url()) {
                    tracing::info!(host = task.host(), "host gone, pools retired");
                }
                stats.unreachable += 1;
            }
        }
    }

    stats
}

/// Spawn `count` workers named `fetch-0`, `fetch-1`, ...
pub fn spawn_workers<C: Clock>(
    count: usize,
    monitor: &Arc<TaskMonitor<C>>,
    fetcher: &Arc<dyn Fetcher>,
    stop: &Arc<AtomicBool>,
    idle: Duration,
) -> Result<Vec<JoinHandle<WorkerStats>>, LifecycleError> {
    (0..count)
        .map(|n| {
            let name = format!("fetch-{}", n);
            let monitor = Arc::clone(monitor);
            let fetcher = Arc::clone(fetcher);
            let stop = Arc::clone(stop);
            std::thread::Builder::new()
                .name(name.clone())
                .spawn(move || run_worker(&*monitor, fetcher.as_ref(), &stop, idle))
                .map_err(|source| LifecycleError::Spawn { name, source })
        })
        .collect()
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
