// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Host reachability tracking.
//!
//! The monitor asks a [`HostTracker`] whether a host is gone before routing
//! work to it. Trackers synchronize themselves; the monitor never holds its
//! own lock across a tracker call that mutates.

use fq_core::{host_key_of, GroupMode, WebPage};
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap, HashSet};

pub trait HostTracker: Send + Sync {
    /// True if the host, or the exact URL, is known to be unreachable
    fn is_gone(&self, host_or_url: &str) -> bool;

    fn is_reachable(&self, host: &str) -> bool {
        !self.is_gone(host)
    }

    fn track_success(&self, page: &WebPage);

    /// Record a failed fetch of `url`. Returns `true` only when this call
    /// newly marks the host gone.
    fn track_host_gone(&self, url: &str) -> bool;

    /// Log a summary of what the tracker knows
    fn report(&self) {}
}

#[derive(Debug, Default)]
struct TrackerState {
    failures: HashMap<String, u32>,
    successes: HashMap<String, u64>,
    gone_hosts: BTreeSet<String>,
    gone_urls: HashSet<String>,
}

/// Failure-counting tracker: a host is gone after `max_host_failures`
/// failures without an intervening success.
#[derive(Debug)]
pub struct FetchTaskTracker {
    group_mode: GroupMode,
    max_host_failures: u32,
    state: Mutex<TrackerState>,
}

impl FetchTaskTracker {
    pub fn new(group_mode: GroupMode, max_host_failures: u32) -> Self {
        Self {
            group_mode,
            max_host_failures: max_host_failures.max(1),
            state: Mutex::new(TrackerState::default()),
        }
    }

    /// Host key for a URL, or the input itself if it is already a host
    fn host_of(&self, host_or_url: &str) -> String {
        if host_or_url.contains("://") {
            if let Some(host) = host_key_of(host_or_url, self.group_mode) {
                return host;
            }
        }
        host_or_url.to_string()
    }

    /// Mark one exact URL unreachable without touching its host
    pub fn mark_url_gone(&self, url: &str) {
        self.state.lock().gone_urls.insert(url.to_string());
    }

    pub fn failure_count(&self, host: &str) -> u32 {
        self.state.lock().failures.get(host).copied().unwrap_or(0)
    }

    pub fn success_count(&self, host: &str) -> u64 {
        self.state.lock().successes.get(host).copied().unwrap_or(0)
    }

    pub fn gone_hosts(&self) -> Vec<String> {
        self.state.lock().gone_hosts.iter().cloned().collect()
    }
}

impl HostTracker for FetchTaskTracker {
    fn is_gone(&self, host_or_url: &str) -> bool {
        let host = self.host_of(host_or_url);
        let state = self.state.lock();
        state.gone_urls.contains(host_or_url) || state.gone_hosts.contains(&host)
    }

    fn track_success(&self, page: &WebPage) {
        let host = self.host_of(&page.url);
        let mut state = self.state.lock();
        state.failures.remove(&host);
        *state.successes.entry(host).or_default() += 1;
    }

    fn track_host_gone(&self, url: &str) -> bool {
        let host = self.host_of(url);
        let mut state = self.state.lock();
        if state.gone_hosts.contains(&host) {
            return false;
        }

        let failures = state.failures.entry(host.clone()).or_default();
        *failures += 1;
        let failures = *failures;
        if failures < self.max_host_failures {
            tracing::debug!(host = %host, failures, "fetch failure");
            return false;
        }

        state.failures.remove(&host);
        state.gone_hosts.insert(host.clone());
        tracing::info!(host = %host, failures, "host marked gone");
        true
    }

    fn report(&self) {
        let state = self.state.lock();
        let total_successes: u64 = state.successes.values().sum();
        tracing::info!(
            gone_hosts = state.gone_hosts.len(),
            gone_urls = state.gone_urls.len(),
            failing_hosts = state.failures.len(),
            succeeded_hosts = state.successes.len(),
            total_successes,
            "host tracker report"
        );
        if !state.gone_hosts.is_empty() {
            let hosts: Vec<&str> = state.gone_hosts.iter().map(String::as_str).collect();
            tracing::info!(hosts = %hosts.join(", "), "gone hosts");
        }
    }
}

#[cfg(test)]
#[path = "tracker_tests.rs"]
mod tests;
