// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! fq-daemon: seed feeder, fetch workers, and daemon lifecycle for `fqd`

pub mod env;
pub mod feeder;
pub mod lifecycle;
pub mod worker;

pub use feeder::{parse_seed_line, Seed};
pub use lifecycle::{Config, DaemonState, LifecycleError, RunSummary};
pub use worker::{DryRunFetcher, FetchOutcome, Fetcher, WorkerStats};
