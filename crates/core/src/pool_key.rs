// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Identity of a task pool.

use crate::Priority;
use serde::{Deserialize, Serialize};
use std::fmt;

/// `(priority, protocol, host)`.
///
/// Two tasks share a pool iff their keys are equal. Field order matters:
/// the derived `Ord` compares priority first (most urgent first), then
/// protocol, then host.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PoolKey {
    pub priority: Priority,
    pub protocol: String,
    pub host: String,
}

impl PoolKey {
    pub fn new(priority: Priority, protocol: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            priority,
            protocol: protocol.into(),
            host: host.into(),
        }
    }
}

impl fmt::Display for PoolKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}://{}", self.priority, self.protocol, self.host)
    }
}
