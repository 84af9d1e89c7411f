// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Page reference attached to a fetch task.

use crate::Priority;
use serde::{Deserialize, Serialize};

/// The document a fetch task is about.
///
/// The scheduler only reads `url` and `fetch_priority`; the page travels
/// with the task so the worker that fetches it has everything at hand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebPage {
    pub url: String,
    #[serde(default)]
    pub fetch_priority: Priority,
    /// Number of earlier fetch attempts
    #[serde(default)]
    pub fetch_count: u32,
}

impl WebPage {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            fetch_priority: Priority::DEFAULT,
            fetch_count: 0,
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.fetch_priority = priority;
        self
    }
}
