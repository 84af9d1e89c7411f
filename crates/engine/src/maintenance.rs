// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Periodic maintenance timers

use crate::config::{deadline_after, MonitorConfig};
use crate::monitor::{MaintenanceSummary, TaskMonitor};
use fq_core::Clock;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Work a maintenance timer triggers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MaintenanceAction {
    /// Reclaim stale pending tasks, retire gone hosts, park drained pools
    Retune,
    /// Evict the slowest pool if it is under the throughput floor
    Evict,
    Report,
}

impl fmt::Display for MaintenanceAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MaintenanceAction::Retune => write!(f, "retune"),
            MaintenanceAction::Evict => write!(f, "evict"),
            MaintenanceAction::Report => write!(f, "report"),
        }
    }
}

#[derive(Debug, Clone)]
struct Timer {
    fires_at: Instant,
    interval: Duration,
}

/// Repeating deadlines, one per action
#[derive(Debug, Default)]
pub struct MaintenanceTimers {
    timers: BTreeMap<MaintenanceAction, Timer>,
}

impl MaintenanceTimers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm every action the config enables. Eviction is only armed when a
    /// throughput floor is set.
    pub fn from_config(config: &MonitorConfig, now: Instant) -> Self {
        let mut timers = Self::new();
        timers.arm(MaintenanceAction::Retune, config.retune_interval, now);
        if config.min_throughput.is_some() {
            timers.arm(MaintenanceAction::Evict, config.evict_interval, now);
        }
        timers.arm(MaintenanceAction::Report, config.report_interval, now);
        timers
    }

    /// Fire `action` every `interval`, first at `now + interval`
    pub fn arm(&mut self, action: MaintenanceAction, interval: Duration, now: Instant) {
        self.timers.insert(
            action,
            Timer {
                fires_at: deadline_after(now, interval),
                interval,
            },
        );
    }

    pub fn disarm(&mut self, action: MaintenanceAction) {
        self.timers.remove(&action);
    }

    pub fn is_armed(&self, action: MaintenanceAction) -> bool {
        self.timers.contains_key(&action)
    }

    /// Actions whose deadline has passed, in declaration order. Each is
    /// re-armed one interval after `now`.
    pub fn fired(&mut self, now: Instant) -> Vec<MaintenanceAction> {
        let mut fired = Vec::new();
        for (action, timer) in self.timers.iter_mut() {
            if timer.fires_at <= now {
                fired.push(*action);
                timer.fires_at = deadline_after(now, timer.interval);
            }
        }
        fired
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.values().map(|t| t.fires_at).min()
    }
}

/// Apply fired actions to a monitor
pub fn run_maintenance<C: Clock>(monitor: &TaskMonitor<C>, actions: &[MaintenanceAction]) {
    for action in actions {
        match action {
            MaintenanceAction::Retune => {
                monitor.retune(false);
                let summary = monitor.maintain();
                if summary != MaintenanceSummary::default() {
                    tracing::info!(
                        retired = summary.retired,
                        disabled = summary.disabled,
                        collected = summary.collected,
                        "maintenance pass"
                    );
                }
            }
            MaintenanceAction::Evict => {
                let dropped = monitor.try_clear_slowest_queue();
                if dropped > 0 {
                    tracing::info!(dropped, "evicted slow pool");
                }
            }
            MaintenanceAction::Report => monitor.report(),
        }
    }
}

/// Spawn a task that checks the timers every `tick` until the monitor closes
pub fn spawn_maintenance<C: Clock>(
    monitor: Arc<TaskMonitor<C>>,
    tick: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut timers = MaintenanceTimers::from_config(monitor.config(), monitor.clock().now());
        let mut interval = tokio::time::interval(tick);

        loop {
            interval.tick().await;
            if monitor.is_closed() {
                break;
            }

            let actions = timers.fired(monitor.clock().now());
            if !actions.is_empty() {
                tracing::debug!(?actions, "maintenance timers fired");
                run_maintenance(&monitor, &actions);
            }
        }
    })
}

#[cfg(test)]
#[path = "maintenance_tests.rs"]
mod tests;
