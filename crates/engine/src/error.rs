// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the scheduler

use fq_core::{ItemId, PoolKey};
use std::path::PathBuf;
use thiserror::Error;

/// Errors a single pool can report.
///
/// `KeyMismatch` and `Retired` are routing defects: the monitor derives the
/// pool from the task and never hands a task to a retired pool.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PoolError {
    #[error("task key {actual} does not match pool {expected}")]
    KeyMismatch { expected: PoolKey, actual: PoolKey },
    #[error("pool {0} is retired")]
    Retired(PoolKey),
    /// The item id is already ready or pending in the pool
    #[error("item {item} is already queued in pool {pool}")]
    DuplicateItem { pool: PoolKey, item: ItemId },
}

/// Errors loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid duration: {0}")]
    InvalidDuration(String),
    #[error("invalid config: {0}")]
    Invalid(String),
}
