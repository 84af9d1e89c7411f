// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon crate.

use std::path::PathBuf;
use std::time::Duration;

use crate::lifecycle::LifecycleError;

/// Resolve state directory: FQ_STATE_DIR > XDG_STATE_HOME/fq > ~/.local/state/fq
pub fn state_dir() -> Result<PathBuf, LifecycleError> {
    if let Ok(dir) = std::env::var("FQ_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("fq"));
    }
    let home = std::env::var("HOME").map_err(|_| LifecycleError::NoStateDir)?;
    Ok(PathBuf::from(home).join(".local/state/fq"))
}

/// Explicit config file path
pub fn config_path() -> Option<PathBuf> {
    std::env::var("FQ_CONFIG").ok().map(PathBuf::from)
}

/// Worker thread count override; zero is ignored
pub fn workers() -> Option<usize> {
    std::env::var("FQ_WORKERS")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .filter(|&n| n > 0)
}

/// Maintenance tick override
pub fn tick_ms() -> Option<Duration> {
    std::env::var("FQ_TICK_MS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .filter(|&ms| ms > 0)
        .map(Duration::from_millis)
}

/// Simulated latency for the dry-run fetcher
pub fn fetch_latency_ms() -> Option<Duration> {
    std::env::var("FQ_FETCH_LATENCY_MS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
