// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fetch task: one unit of crawl work.

use crate::group::host_key;
use crate::{GroupMode, ItemId, JobId, PoolKey, Priority, WebPage};
use std::sync::Arc;
use url::Url;

/// A URL to fetch, bound to the pool it belongs to.
///
/// Immutable after creation. Cloning is cheap: the page is shared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTask {
    job_id: JobId,
    priority: Priority,
    url: String,
    protocol: String,
    host: String,
    item_id: ItemId,
    page: Arc<WebPage>,
}

impl FetchTask {
    /// Build a task for `url`.
    ///
    /// Priority comes from the page. Returns `None` if the URL does not
    /// parse or has no host to group by.
    pub fn create(
        job_id: JobId,
        url: &str,
        page: Arc<WebPage>,
        group_mode: GroupMode,
        item_id: ItemId,
    ) -> Option<Self> {
        let parsed = Url::parse(url).ok()?;
        let host = host_key(&parsed, group_mode)?;
        Some(Self {
            job_id,
            priority: page.fetch_priority,
            url: url.to_string(),
            protocol: parsed.scheme().to_string(),
            host,
            item_id,
            page,
        })
    }

    /// Build a task from already-derived parts
    pub fn from_parts(
        job_id: JobId,
        key: PoolKey,
        url: impl Into<String>,
        item_id: ItemId,
        page: Arc<WebPage>,
    ) -> Self {
        Self {
            job_id,
            priority: key.priority,
            url: url.into(),
            protocol: key.protocol,
            host: key.host,
            item_id,
            page,
        }
    }

    pub fn key(&self) -> PoolKey {
        PoolKey::new(self.priority, self.protocol.clone(), self.host.clone())
    }

    /// Cheap key comparison without allocating a `PoolKey`
    pub fn has_key(&self, key: &PoolKey) -> bool {
        self.priority == key.priority && self.protocol == key.protocol && self.host == key.host
    }

    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn item_id(&self) -> ItemId {
        self.item_id
    }

    pub fn page(&self) -> &Arc<WebPage> {
        &self.page
    }
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
