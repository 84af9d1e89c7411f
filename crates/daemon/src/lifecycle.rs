// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle management: config, startup, shutdown.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use fq_core::{JobId, SystemClock};
use fq_engine::{ConfigError, FetchTaskTracker, FileSink, MonitorConfig, TaskMonitor};
use thiserror::Error;
use tracing::{info, warn};

use crate::env;
use crate::feeder::spawn_feeder;
use crate::worker::{spawn_workers, Fetcher, WorkerStats};

/// Worker threads when FQ_WORKERS is unset
pub const DEFAULT_WORKERS: usize = 8;

/// Maintenance tick when FQ_TICK_MS is unset
pub const DEFAULT_TICK: Duration = Duration::from_secs(1);

/// How long an idle worker sleeps before asking again
const WORKER_IDLE: Duration = Duration::from_millis(20);

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Root state directory (e.g. ~/.local/state/fq)
    pub state_dir: PathBuf,
    /// Scheduler config file; may not exist
    pub config_path: PathBuf,
    /// Path to daemon log file
    pub log_path: PathBuf,
    pub workers: usize,
    pub tick: Duration,
    pub fetch_latency: Duration,
    pub monitor: MonitorConfig,
}

impl Config {
    /// Resolve paths from the environment and load the scheduler config.
    ///
    /// `FQ_CONFIG` must name a readable file; the default
    /// `<state_dir>/fq.toml` falls back to built-in defaults when absent.
    pub fn load() -> Result<Self, LifecycleError> {
        let state_dir = env::state_dir()?;

        let (config_path, monitor) = match env::config_path() {
            Some(path) => {
                let monitor = MonitorConfig::load(&path)?;
                (path, monitor)
            }
            None => {
                let path = state_dir.join("fq.toml");
                let monitor = if path.exists() {
                    MonitorConfig::load(&path)?
                } else {
                    MonitorConfig::default()
                };
                (path, monitor)
            }
        };

        Ok(Self {
            log_path: state_dir.join("fqd.log"),
            config_path,
            workers: env::workers().unwrap_or(DEFAULT_WORKERS),
            tick: env::tick_ms().unwrap_or(DEFAULT_TICK),
            fetch_latency: env::fetch_latency_ms().unwrap_or(Duration::ZERO),
            monitor,
            state_dir,
        })
    }
}

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Could not determine state directory")]
    NoStateDir,

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to open seeds {}: {source}", .path.display())]
    Seeds {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to spawn thread {name}: {source}")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Totals reported when the daemon stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub produced: usize,
    pub workers: WorkerStats,
}

/// A running daemon: one monitor, one feeder, N fetch workers
pub struct DaemonState {
    pub config: Config,
    pub job_id: JobId,
    pub monitor: Arc<TaskMonitor<SystemClock>>,
    /// When daemon started
    pub start_time: Instant,
    stop: Arc<AtomicBool>,
    feeder: Option<JoinHandle<usize>>,
    workers: Vec<JoinHandle<WorkerStats>>,
}

/// Start the monitor, feed it from `seeds`, and spawn the workers
pub fn startup(
    config: Config,
    seeds: &Path,
    fetcher: Arc<dyn Fetcher>,
) -> Result<DaemonState, LifecycleError> {
    std::fs::create_dir_all(&config.state_dir)?;

    let job_id = JobId::new(uuid::Uuid::new_v4().to_string());
    let tracker = Arc::new(FetchTaskTracker::new(
        config.monitor.group_mode,
        config.monitor.max_host_failures,
    ));
    let monitor = Arc::new(
        TaskMonitor::new("fqd", config.monitor.clone(), tracker, SystemClock)
            .with_sink(Arc::new(FileSink::new(config.state_dir.clone()))),
    );
    let stop = Arc::new(AtomicBool::new(false));

    let feeder = spawn_feeder(Arc::clone(&monitor), job_id.clone(), seeds, Arc::clone(&stop))?;
    let workers = match spawn_workers(config.workers, &monitor, &fetcher, &stop, WORKER_IDLE) {
        Ok(workers) => workers,
        Err(e) => {
            stop.store(true, Ordering::SeqCst);
            monitor.close();
            return Err(e);
        }
    };

    info!(
        job = %job_id,
        seeds = %seeds.display(),
        workers = config.workers,
        "daemon started"
    );

    Ok(DaemonState {
        config,
        job_id,
        monitor,
        start_time: Instant::now(),
        stop,
        feeder: Some(feeder),
        workers,
    })
}

impl DaemonState {
    /// True once every seed was read and every task acknowledged
    pub fn is_done(&self) -> bool {
        self.monitor.is_feeder_completed() && self.monitor.task_count() == 0
    }

    /// Stop the workers, close the monitor, and collect totals
    pub fn shutdown(mut self) -> RunSummary {
        info!("Shutting down daemon...");
        self.stop.store(true, Ordering::SeqCst);

        let mut summary = RunSummary::default();
        if let Some(feeder) = self.feeder.take() {
            match feeder.join() {
                Ok(produced) => summary.produced = produced,
                Err(_) => warn!("feeder thread panicked"),
            }
        }
        for handle in self.workers.drain(..) {
            let name = handle.thread().name().unwrap_or("worker").to_string();
            match handle.join() {
                Ok(stats) => summary.workers += stats,
                Err(_) => warn!(worker = %name, "worker thread panicked"),
            }
        }

        self.monitor.close();
        info!(
            produced = summary.produced,
            fetched = summary.workers.fetched,
            failed = summary.workers.failed,
            unreachable = summary.workers.unreachable,
            elapsed = ?self.start_time.elapsed(),
            "daemon stopped"
        );
        summary
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
