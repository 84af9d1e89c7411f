// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! fetchq scheduling engine

pub mod config;
mod error;
mod maintenance;
mod monitor;
mod pool;
mod queue;
pub mod report;
mod tracker;

pub use config::{parse_duration, DispatchOrder, FetchMode, MonitorConfig, MAX_DURATION};
pub use error::{ConfigError, PoolError};
pub use maintenance::{run_maintenance, spawn_maintenance, MaintenanceAction, MaintenanceTimers};
pub use monitor::{MaintenanceSummary, TaskMonitor};
pub use pool::{PoolSettings, PoolStatus, TaskPool};
pub use queue::{PoolQueue, RetiredWork};
pub use report::{CollectingSink, FileSink, MonitorReport, ReportSink, TracingSink};
pub use tracker::{FetchTaskTracker, HostTracker};
