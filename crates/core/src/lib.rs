// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! fq-core: value types shared by the fetchq scheduler

pub mod clock;
pub mod group;
pub mod id;
pub mod page;
pub mod pool_key;
pub mod priority;
pub mod task;
pub mod time_fmt;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use clock::{Clock, FakeClock, SystemClock};
pub use group::{host_key, host_key_of, reverse_host, GroupMode};
pub use id::{ItemId, ItemIdGen, JobId, SequentialItemIdGen};
pub use page::WebPage;
pub use pool_key::PoolKey;
pub use priority::Priority;
pub use task::FetchTask;
pub use time_fmt::{format_duration, format_rate};
