// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Monitor reports and where they go.

use crate::pool::{PoolStatus, TaskPool};
use fq_core::{format_duration, format_rate};
use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// One pool as seen by a report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PoolRow {
    pub key: String,
    pub status: PoolStatus,
    pub ready: usize,
    pub pending: usize,
    pub finished: usize,
    pub slow: usize,
    /// Mean seconds per task over recent finishes
    pub recent_cost: f64,
    /// Pages per second over the throughput window
    pub throughput: f64,
}

impl PoolRow {
    pub fn of(pool: &TaskPool, now: Instant) -> Self {
        Self {
            key: pool.key().to_string(),
            status: pool.status(),
            ready: pool.ready_count(),
            pending: pool.pending_count(),
            finished: pool.finished_count(),
            slow: pool.slow_task_count(),
            recent_cost: pool.average_recent_time_cost(),
            throughput: pool.average_throughput(now),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServedHost {
    pub host: String,
    pub threads: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlowPool {
    pub key: String,
    pub recent_cost: f64,
}

/// Point-in-time snapshot of a monitor
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonitorReport {
    pub name: String,
    pub epoch_ms: u64,
    pub active_pools: usize,
    pub extended_pools: usize,
    pub ready: usize,
    pub pending: usize,
    pub finished: usize,
    pub feeder_completed: bool,
    /// Active pools in dispatch order, truncated to the report limit
    pub pools: Vec<PoolRow>,
    pub slowest: Vec<SlowPool>,
    /// Worker threads that finished tasks, per host, related hosts adjacent
    pub served: Vec<ServedHost>,
}

impl fmt::Display for MonitorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "monitor {}: {} active / {} extended pools, ready={} pending={} finished={}{}",
            self.name,
            self.active_pools,
            self.extended_pools,
            self.ready,
            self.pending,
            self.finished,
            if self.feeder_completed {
                " (feeder done)"
            } else {
                ""
            }
        )?;
        for row in &self.pools {
            writeln!(
                f,
                "  {} [{}] ready={} pending={} finished={} slow={} cost={} rate={}",
                row.key,
                row.status,
                row.ready,
                row.pending,
                row.finished,
                row.slow,
                format_duration(Duration::from_secs_f64(row.recent_cost)),
                format_rate(row.throughput)
            )?;
        }
        if !self.slowest.is_empty() {
            writeln!(f, "slowest:")?;
            for slow in &self.slowest {
                writeln!(
                    f,
                    "  {} {}",
                    slow.key,
                    format_duration(Duration::from_secs_f64(slow.recent_cost))
                )?;
            }
        }
        if !self.served.is_empty() {
            writeln!(f, "served:")?;
            for served in &self.served {
                writeln!(f, "  {} <- {}", served.host, served.threads.join(", "))?;
            }
        }
        Ok(())
    }
}

/// Destination for monitor reports
pub trait ReportSink: Send + Sync {
    fn emit(&self, report: &MonitorReport);
}

/// Logs each report through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ReportSink for TracingSink {
    fn emit(&self, report: &MonitorReport) {
        tracing::info!(
            monitor = %report.name,
            ready = report.ready,
            pending = report.pending,
            finished = report.finished,
            pools = report.active_pools,
            "report\n{}",
            report
        );
    }
}

/// Append-only JSON-lines report file.
///
/// Writes one line per report to `<dir>/report/<monitor>.jsonl`. Each
/// `emit()` opens, writes, and closes the file.
#[derive(Debug, Clone)]
pub struct FileSink {
    dir: PathBuf,
}

impl FileSink {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn path_for(&self, monitor: &str) -> PathBuf {
        self.dir.join("report").join(format!("{}.jsonl", monitor))
    }

    fn write_line(&self, path: &Path, report: &MonitorReport) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let line = serde_json::to_string(report)?;
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{}", line)?;
        Ok(())
    }
}

impl ReportSink for FileSink {
    /// Failures are logged and swallowed; reporting never stops the monitor.
    fn emit(&self, report: &MonitorReport) {
        let path = self.path_for(&report.name);
        if let Err(e) = self.write_line(&path, report) {
            tracing::warn!(
                monitor = %report.name,
                path = %path.display(),
                error = %e,
                "failed to write report"
            );
        }
    }
}

/// Keeps every report in memory
#[derive(Debug, Default)]
pub struct CollectingSink {
    reports: Mutex<Vec<MonitorReport>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<MonitorReport> {
        self.reports.lock().clone()
    }

    pub fn last(&self) -> Option<MonitorReport> {
        self.reports.lock().last().cloned()
    }

    pub fn len(&self) -> usize {
        self.reports.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.lock().is_empty()
    }
}

impl ReportSink for CollectingSink {
    fn emit(&self, report: &MonitorReport) {
        self.reports.lock().push(report.clone());
    }
}

#[cfg(test)]
#[path = "report_tests.rs"]
mod tests;
