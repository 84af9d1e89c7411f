// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scheduler configuration.
//!
//! Loaded from TOML; every key is optional. Durations are written as
//! strings (`"5s"`, `"250ms"`, `"3m"`).

use crate::error::ConfigError;
use crate::pool::PoolSettings;
use fq_core::GroupMode;
use serde::{Deserialize, Deserializer};
use std::path::Path;
use std::time::{Duration, Instant};

/// Upper bound on every configured delay, timeout and interval
pub const MAX_DURATION: Duration = Duration::from_secs(30 * 24 * 3600);

/// `now + d`, with `d` clamped to [`MAX_DURATION`] so the sum cannot
/// overflow `Instant`.
pub(crate) fn deadline_after(now: Instant, d: Duration) -> Instant {
    now + d.min(MAX_DURATION)
}

/// Parse a duration string like "30s", "5m", "1h" into a Duration
pub fn parse_duration(s: &str) -> Result<Duration, ConfigError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(ConfigError::InvalidDuration("empty duration string".to_string()));
    }

    // Find the numeric prefix
    let (num_str, suffix) = s
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map(|(i, _)| (&s[..i], &s[i..]))
        .unwrap_or((s, ""));

    let num: u64 = num_str
        .parse()
        .map_err(|_| ConfigError::InvalidDuration(format!("invalid number in duration: {}", s)))?;

    let multiplier = match suffix.trim() {
        "ms" | "millis" | "millisecond" | "milliseconds" => {
            return Ok(Duration::from_millis(num));
        }
        "" | "s" | "sec" | "secs" | "second" | "seconds" => 1,
        "m" | "min" | "mins" | "minute" | "minutes" => 60,
        "h" | "hr" | "hrs" | "hour" | "hours" => 3600,
        other => {
            return Err(ConfigError::InvalidDuration(format!(
                "unknown duration suffix: {}",
                other
            )))
        }
    };

    num.checked_mul(multiplier)
        .map(Duration::from_secs)
        .ok_or_else(|| ConfigError::InvalidDuration(format!("duration too large: {}", s)))
}

fn duration_str<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    parse_duration(&s).map_err(serde::de::Error::custom)
}

/// How fetch workers relate to pools
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchMode {
    /// Workers are local threads; per-pool concurrency is capped
    #[default]
    Native,
    /// Work is handed to remote fetchers; pools are not capped
    Crowdsourcing,
}

/// Order in which a pool hands out its ready tasks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchOrder {
    /// Oldest first
    #[default]
    Fifo,
    /// Newest first
    Lifo,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MonitorConfig {
    pub fetch_mode: FetchMode,
    /// Max simultaneous pending tasks per pool
    pub pool_threads: usize,
    pub group_mode: GroupMode,
    /// Politeness spacing for single-slot pools
    #[serde(deserialize_with = "duration_str")]
    pub crawl_delay: Duration,
    /// Politeness spacing for multi-slot pools, and between dispatches
    #[serde(deserialize_with = "duration_str")]
    pub min_crawl_delay: Duration,
    /// Age after which a pending task may be reclaimed
    #[serde(deserialize_with = "duration_str")]
    pub pending_timeout: Duration,
    /// Pages per second below which the slowest pool is evicted; unset disables eviction
    pub min_throughput: Option<f64>,
    /// Most pending tasks an evicted pool may drop outright
    pub slow_pool_pending_limit: usize,
    #[serde(deserialize_with = "duration_str")]
    pub slow_task_threshold: Duration,
    #[serde(deserialize_with = "duration_str")]
    pub throughput_window: Duration,
    pub dispatch_order: DispatchOrder,
    /// Failures before the tracker declares a host gone
    pub max_host_failures: u32,
    /// Rows in dumps and cost reports
    pub report_limit: usize,
    #[serde(deserialize_with = "duration_str")]
    pub retune_interval: Duration,
    #[serde(deserialize_with = "duration_str")]
    pub evict_interval: Duration,
    #[serde(deserialize_with = "duration_str")]
    pub report_interval: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            fetch_mode: FetchMode::Native,
            pool_threads: 1,
            group_mode: GroupMode::Host,
            crawl_delay: Duration::from_secs(5),
            min_crawl_delay: Duration::ZERO,
            pending_timeout: Duration::from_secs(3 * 60),
            min_throughput: None,
            slow_pool_pending_limit: 2,
            slow_task_threshold: Duration::from_secs(30),
            throughput_window: Duration::from_secs(60),
            dispatch_order: DispatchOrder::Fifo,
            max_host_failures: 3,
            report_limit: 20,
            retune_interval: Duration::from_secs(30),
            evict_interval: Duration::from_secs(60),
            report_interval: Duration::from_secs(5 * 60),
        }
    }
}

impl MonitorConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: MonitorConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pool_threads == 0 {
            return Err(ConfigError::Invalid("pool_threads must be at least 1".into()));
        }
        if let Some(floor) = self.min_throughput {
            if !floor.is_finite() || floor < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "min_throughput must be a non-negative number, got {}",
                    floor
                )));
            }
        }
        if self.min_crawl_delay > self.crawl_delay {
            return Err(ConfigError::Invalid(
                "min_crawl_delay must not exceed crawl_delay".into(),
            ));
        }
        if self.throughput_window.is_zero() {
            return Err(ConfigError::Invalid("throughput_window must be positive".into()));
        }
        for (name, value) in self.durations() {
            if value > MAX_DURATION {
                return Err(ConfigError::Invalid(format!(
                    "{} must not exceed {:?}, got {:?}",
                    name, MAX_DURATION, value
                )));
            }
        }
        Ok(())
    }

    fn durations(&self) -> [(&'static str, Duration); 8] {
        [
            ("crawl_delay", self.crawl_delay),
            ("min_crawl_delay", self.min_crawl_delay),
            ("pending_timeout", self.pending_timeout),
            ("slow_task_threshold", self.slow_task_threshold),
            ("throughput_window", self.throughput_window),
            ("retune_interval", self.retune_interval),
            ("evict_interval", self.evict_interval),
            ("report_interval", self.report_interval),
        ]
    }

    /// Per-pool concurrency cap; `None` means uncapped
    pub fn pool_concurrency(&self) -> Option<usize> {
        match self.fetch_mode {
            FetchMode::Native => Some(self.pool_threads),
            FetchMode::Crowdsourcing => None,
        }
    }

    /// Settings handed to every new pool
    pub fn pool_settings(&self) -> PoolSettings {
        PoolSettings {
            concurrency: self.pool_concurrency(),
            crawl_delay: self.crawl_delay,
            min_crawl_delay: self.min_crawl_delay,
            pending_timeout: self.pending_timeout,
            slow_task_threshold: self.slow_task_threshold,
            throughput_window: self.throughput_window,
            dispatch_order: self.dispatch_order,
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
