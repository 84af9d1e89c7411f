// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fetch Queue Daemon (fqd)
//!
//! Reads seed URLs, schedules them through a task monitor, and drives a
//! pool of fetch workers until every seed is acknowledged or a signal
//! arrives.
//!
//! Architecture:
//! - Feeder thread: reads the seeds file into the monitor
//! - Worker threads: consume, fetch, acknowledge
//! - Maintenance task: retune, evict, and report on timers
//! - Main loop: waits for completion or SIGTERM/SIGINT

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use fq_daemon::lifecycle::{self, Config, LifecycleError};
use fq_daemon::worker::{DryRunFetcher, Fetcher};
use fq_engine::spawn_maintenance;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info};

const USAGE: &str = "Usage: fqd <seeds-file> | --help | --version";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let seeds = match std::env::args().nth(1) {
        Some(arg) => match arg.as_str() {
            "--version" | "-V" | "-v" => {
                println!("fqd {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" | "-h" | "help" => {
                println!("fqd {}", env!("CARGO_PKG_VERSION"));
                println!("Fetch Queue Daemon - schedules seed URLs across per-host fetch pools");
                println!();
                println!("USAGE:");
                println!("    fqd <seeds-file>");
                println!();
                println!("Each seeds line is `<url> [priority]`; lower priorities are");
                println!("fetched first. Blank lines and `#` comments are skipped.");
                println!();
                println!("ENVIRONMENT:");
                println!("    FQ_STATE_DIR          State directory (log, reports, fq.toml)");
                println!("    FQ_CONFIG             Scheduler config file");
                println!("    FQ_WORKERS            Fetch worker threads (default 8)");
                println!("    FQ_TICK_MS            Maintenance tick in milliseconds");
                println!("    FQ_FETCH_LATENCY_MS   Simulated fetch latency");
                println!();
                println!("OPTIONS:");
                println!("    -h, --help       Print help information");
                println!("    -v, --version    Print version information");
                return Ok(());
            }
            flag if flag.starts_with('-') => {
                eprintln!("error: unexpected argument '{flag}'");
                eprintln!("{USAGE}");
                std::process::exit(1);
            }
            path => PathBuf::from(path),
        },
        None => {
            eprintln!("error: missing seeds file");
            eprintln!("{USAGE}");
            std::process::exit(1);
        }
    };

    let config = Config::load()?;
    std::fs::create_dir_all(&config.state_dir)?;
    rotate_log_if_needed(&config.log_path);

    // Write startup marker to log (before tracing setup)
    write_startup_marker(&config)?;
    let log_guard = setup_logging(&config)?;

    info!(
        state_dir = %config.state_dir.display(),
        config = %config.config_path.display(),
        "Starting fetch daemon"
    );

    let fetcher: Arc<dyn Fetcher> = Arc::new(DryRunFetcher::new(config.fetch_latency));
    let daemon = match lifecycle::startup(config.clone(), &seeds, fetcher) {
        Ok(daemon) => daemon,
        Err(e) => {
            // Write error synchronously (tracing is non-blocking and may not flush in time)
            write_startup_error(&config, &e);
            error!("Failed to start daemon: {}", e);
            drop(log_guard);
            return Err(e.into());
        }
    };

    let maintenance = spawn_maintenance(Arc::clone(&daemon.monitor), config.tick);

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    println!("READY");

    // NOTE: Must be created outside the loop so the tick survives select! re-evaluation
    let mut done_check = tokio::time::interval(config.tick);

    loop {
        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down...");
                break;
            }
            _ = sigint.recv() => {
                info!("Received SIGINT, shutting down...");
                break;
            }
            _ = done_check.tick() => {
                if daemon.is_done() {
                    info!("All seeds acknowledged");
                    break;
                }
            }
        }
    }

    let summary = tokio::task::spawn_blocking(move || daemon.shutdown()).await?;
    if let Err(e) = maintenance.await {
        error!("maintenance task failed: {}", e);
    }

    println!(
        "fetched {} of {} ({} failed, {} unreachable)",
        summary.workers.fetched, summary.produced, summary.workers.failed, summary.workers.unreachable
    );
    info!("Daemon stopped");
    Ok(())
}

/// Rotate once the log grows past this many bytes
pub const MAX_LOG_SIZE: u64 = 10 * 1024 * 1024;

/// Rotated logs kept as `<log>.1` through `<log>.N`
const MAX_ROTATIONS: usize = 3;

fn rotated_path(log_path: &Path, n: usize) -> PathBuf {
    let mut name = log_path.as_os_str().to_owned();
    name.push(format!(".{}", n));
    PathBuf::from(name)
}

/// Shift `<log>`, `<log>.1`, `<log>.2` up by one if `<log>` is too large.
/// The oldest rotation is dropped. Failures are ignored.
fn rotate_log_if_needed(log_path: &Path) {
    let Ok(meta) = std::fs::metadata(log_path) else {
        return;
    };
    if meta.len() <= MAX_LOG_SIZE {
        return;
    }

    let _ = std::fs::remove_file(rotated_path(log_path, MAX_ROTATIONS));
    for n in (1..MAX_ROTATIONS).rev() {
        let from = rotated_path(log_path, n);
        if from.exists() {
            let _ = std::fs::rename(&from, rotated_path(log_path, n + 1));
        }
    }
    let _ = std::fs::rename(log_path, rotated_path(log_path, 1));
}

/// Startup marker prefix written to log before anything else.
/// Full format: "--- fqd: starting (pid: 12345) ---"
pub const STARTUP_MARKER_PREFIX: &str = "--- fqd: starting (pid: ";

/// Write startup marker to log file (appends to existing log)
fn write_startup_marker(config: &Config) -> Result<(), LifecycleError> {
    use std::io::Write;

    if let Some(parent) = config.log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.log_path)?;
    writeln!(file, "{}{}) ---", STARTUP_MARKER_PREFIX, std::process::id())?;

    Ok(())
}

/// Write startup error synchronously to log file.
fn write_startup_error(config: &Config, error: &LifecycleError) {
    use std::io::Write;

    let Ok(mut file) = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.log_path)
    else {
        return;
    };
    let _ = writeln!(file, "ERROR Failed to start daemon: {}", error);
}

fn setup_logging(
    config: &Config,
) -> Result<tracing_appender::non_blocking::WorkerGuard, LifecycleError> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    if let Some(parent) = config.log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file_appender = tracing_appender::rolling::never(
        config.log_path.parent().ok_or(LifecycleError::NoStateDir)?,
        config
            .log_path
            .file_name()
            .ok_or(LifecycleError::NoStateDir)?,
    );
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking))
        .init();

    Ok(guard)
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
