// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fetch priority.
//!
//! Lower numeric values are more urgent. The derived `Ord` therefore sorts
//! the most urgent priority first, and every pool ordering in the engine
//! builds on that.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Priority(pub i32);

impl Priority {
    pub const DEFAULT: Priority = Priority(0);

    pub fn value(self) -> i32 {
        self.0
    }

    /// True if `self` should be dispatched before `other`
    pub fn is_more_urgent_than(self, other: Priority) -> bool {
        self.0 < other.0
    }

    /// True if `self` should wait behind `other`
    pub fn is_less_urgent_than(self, other: Priority) -> bool {
        self.0 > other.0
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl From<i32> for Priority {
    fn from(value: i32) -> Self {
        Self(value)
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
#[path = "priority_tests.rs"]
mod tests;
