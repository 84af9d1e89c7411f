// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for use across crates.
//!
//! Gated behind `#[cfg(any(test, feature = "test-support"))]`.

use crate::{FetchTask, ItemId, JobId, PoolKey, Priority, WebPage};
use std::sync::Arc;

// ── Key and task factory functions ──────────────────────────────────────────

pub fn http_key(priority: i32, host: &str) -> PoolKey {
    PoolKey::new(Priority(priority), "http", host)
}

pub fn page(url: &str, priority: i32) -> Arc<WebPage> {
    Arc::new(WebPage::new(url).with_priority(Priority(priority)))
}

/// Task `item` for `http://{host}/{item}` at `priority`
pub fn http_task(priority: i32, host: &str, item: u64) -> FetchTask {
    let url = format!("http://{}/{}", host, item);
    FetchTask::from_parts(
        JobId::new("test-job"),
        http_key(priority, host),
        url.clone(),
        ItemId(item),
        page(&url, priority),
    )
}
