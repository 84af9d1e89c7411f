// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-key task pool.
//!
//! A pool holds the ready and pending tasks of one `(priority, protocol,
//! host)` key, enforces the per-pool concurrency cap and politeness
//! spacing, and keeps the cost statistics used to rank slow hosts.
//!
//! Pools never read the clock themselves; every time-dependent call takes
//! `now` so the monitor decides what time it is.

use crate::config::{deadline_after, DispatchOrder};
use crate::error::PoolError;
use fq_core::{FetchTask, ItemId, PoolKey, Priority};
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::time::{Duration, Instant};

/// Number of finishes averaged by [`TaskPool::average_recent_time_cost`]
const RECENT_COSTS: usize = 20;

/// Limits and policies applied to every pool created by a monitor
#[derive(Debug, Clone, PartialEq)]
pub struct PoolSettings {
    /// Max simultaneous pending tasks; `None` means uncapped
    pub concurrency: Option<usize>,
    pub crawl_delay: Duration,
    pub min_crawl_delay: Duration,
    pub pending_timeout: Duration,
    pub slow_task_threshold: Duration,
    pub throughput_window: Duration,
    pub dispatch_order: DispatchOrder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PoolStatus {
    Active,
    /// Drained and parked; still reachable for late acknowledgements
    Disabled,
    /// Permanently closed for new work
    Retired,
}

impl fmt::Display for PoolStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolStatus::Active => write!(f, "active"),
            PoolStatus::Disabled => write!(f, "disabled"),
            PoolStatus::Retired => write!(f, "retired"),
        }
    }
}

#[derive(Debug)]
struct PendingTask {
    task: FetchTask,
    dispatched_at: Instant,
}

#[derive(Debug)]
pub struct TaskPool {
    key: PoolKey,
    settings: PoolSettings,
    status: PoolStatus,
    ready: VecDeque<FetchTask>,
    pending: BTreeMap<ItemId, PendingTask>,
    /// Earliest instant the next dispatch is allowed
    next_dispatch_at: Instant,
    created_at: Instant,
    disabled_since: Option<Instant>,
    finished_count: usize,
    slow_task_count: usize,
    total_cost: Duration,
    recent_costs: VecDeque<Duration>,
    /// Finish instants inside the trailing throughput window
    recent_finishes: VecDeque<Instant>,
}

impl TaskPool {
    pub fn new(key: PoolKey, settings: PoolSettings, now: Instant) -> Self {
        Self {
            key,
            settings,
            status: PoolStatus::Active,
            ready: VecDeque::new(),
            pending: BTreeMap::new(),
            next_dispatch_at: now,
            created_at: now,
            disabled_since: None,
            finished_count: 0,
            slow_task_count: 0,
            total_cost: Duration::ZERO,
            recent_costs: VecDeque::with_capacity(RECENT_COSTS),
            recent_finishes: VecDeque::new(),
        }
    }

    pub fn key(&self) -> &PoolKey {
        &self.key
    }

    pub fn priority(&self) -> Priority {
        self.key.priority
    }

    pub fn host(&self) -> &str {
        &self.key.host
    }

    pub fn settings(&self) -> &PoolSettings {
        &self.settings
    }

    pub fn status(&self) -> PoolStatus {
        self.status
    }

    pub fn is_active(&self) -> bool {
        self.status == PoolStatus::Active
    }

    pub fn is_retired(&self) -> bool {
        self.status == PoolStatus::Retired
    }

    pub fn disabled_since(&self) -> Option<Instant> {
        self.disabled_since
    }

    /// Queue a task for dispatch. An item id that is already ready or
    /// pending in this pool is refused.
    pub fn produce(&mut self, task: FetchTask) -> Result<(), PoolError> {
        if self.is_retired() {
            return Err(PoolError::Retired(self.key.clone()));
        }
        if !task.has_key(&self.key) {
            return Err(PoolError::KeyMismatch {
                expected: self.key.clone(),
                actual: task.key(),
            });
        }
        let item = task.item_id();
        if self.pending.contains_key(&item) || self.ready.iter().any(|t| t.item_id() == item) {
            return Err(PoolError::DuplicateItem {
                pool: self.key.clone(),
                item,
            });
        }
        self.ready.push_back(task);
        Ok(())
    }

    /// True if the concurrency cap is reached
    pub fn is_full(&self) -> bool {
        self.settings
            .concurrency
            .is_some_and(|cap| self.pending.len() >= cap)
    }

    /// True if [`consume`](Self::consume) would hand out a task at `now`
    pub fn can_dispatch(&self, now: Instant) -> bool {
        self.is_active() && !self.ready.is_empty() && !self.is_full() && now >= self.next_dispatch_at
    }

    /// Move the next ready task to pending and return it.
    ///
    /// Returns `None` when the pool is not active, has nothing ready, is at
    /// its concurrency cap, or the politeness interval has not elapsed.
    pub fn consume(&mut self, now: Instant) -> Option<FetchTask> {
        if !self.is_active() || self.is_full() || now < self.next_dispatch_at {
            return None;
        }

        let task = match self.settings.dispatch_order {
            DispatchOrder::Fifo => self.ready.pop_front(),
            DispatchOrder::Lifo => self.ready.pop_back(),
        }?;

        self.pending.insert(
            task.item_id(),
            PendingTask {
                task: task.clone(),
                dispatched_at: now,
            },
        );
        self.next_dispatch_at = self.next_dispatch_at
            .max(deadline_after(now, self.settings.min_crawl_delay));

        tracing::debug!(
            pool = %self.key,
            item = %task.item_id(),
            ready = self.ready.len(),
            pending = self.pending.len(),
            "dispatched"
        );
        Some(task)
    }

    pub fn pending_task_exists(&self, item_id: ItemId) -> bool {
        self.pending.contains_key(&item_id)
    }

    pub fn pending_task(&self, item_id: ItemId) -> Option<&FetchTask> {
        self.pending.get(&item_id).map(|p| &p.task)
    }

    /// Acknowledge a pending task.
    ///
    /// Returns `false` (and changes nothing) if the item is not pending,
    /// which happens with duplicate or late acknowledgements. `asap`
    /// finishes leave the politeness clock untouched.
    pub fn finish(&mut self, item_id: ItemId, asap: bool, now: Instant) -> bool {
        let Some(pending) = self.pending.remove(&item_id) else {
            tracing::debug!(pool = %self.key, item = %item_id, "finish for item not pending");
            return false;
        };

        let elapsed = now.saturating_duration_since(pending.dispatched_at);
        self.finished_count += 1;
        self.total_cost += elapsed;
        if elapsed > self.settings.slow_task_threshold {
            self.slow_task_count += 1;
        }

        if self.recent_costs.len() == RECENT_COSTS {
            self.recent_costs.pop_front();
        }
        self.recent_costs.push_back(elapsed);

        self.recent_finishes.push_back(now);
        while let Some(&oldest) = self.recent_finishes.front() {
            if now.saturating_duration_since(oldest) > self.settings.throughput_window {
                self.recent_finishes.pop_front();
            } else {
                break;
            }
        }

        if !asap {
            self.next_dispatch_at = self.next_dispatch_at
                .max(deadline_after(now, self.politeness_delay()));
        }
        true
    }

    fn politeness_delay(&self) -> Duration {
        match self.settings.concurrency {
            Some(1) => self.settings.crawl_delay,
            _ => self.settings.min_crawl_delay,
        }
    }

    /// Put stale pending tasks back in front of the ready queue.
    ///
    /// A pending task is stale once it has waited `pending_timeout`; with
    /// `force` every pending task is reclaimed. Returns the number moved.
    pub fn retune(&mut self, force: bool, now: Instant) -> usize {
        if self.is_retired() {
            return 0;
        }

        let timeout = self.settings.pending_timeout;
        let stale: Vec<ItemId> = self
            .pending
            .iter()
            .filter(|(_, p)| force || now.saturating_duration_since(p.dispatched_at) >= timeout)
            .map(|(id, _)| *id)
            .collect();

        // Reverse so the oldest reclaimed task ends up first in line
        for id in stale.iter().rev() {
            if let Some(p) = self.pending.remove(id) {
                self.ready.push_front(p.task);
            }
        }

        if !stale.is_empty() {
            tracing::info!(
                pool = %self.key,
                reclaimed = stale.len(),
                force,
                ready = self.ready.len(),
                pending = self.pending.len(),
                "reclaimed pending tasks"
            );
        }
        stale.len()
    }

    /// Drop every pending task if there are at most `limit`, without
    /// requeueing. Returns the number dropped.
    pub fn clear_pending_tasks_if_few(&mut self, limit: usize) -> usize {
        if self.pending.len() > limit {
            return 0;
        }
        self.abandon_pending()
    }

    /// Drop every pending task without requeueing
    pub fn abandon_pending(&mut self) -> usize {
        let dropped = self.pending.len();
        self.pending.clear();
        dropped
    }

    /// Drop every ready task. Returns the number dropped.
    pub fn clear_ready_queue(&mut self) -> usize {
        let dropped = self.ready.len();
        self.ready.clear();
        dropped
    }

    pub fn retire(&mut self) {
        self.status = PoolStatus::Retired;
        self.disabled_since = None;
    }

    /// Park a pool. Retired pools stay retired.
    pub fn disable(&mut self, now: Instant) {
        if self.is_retired() {
            return;
        }
        self.status = PoolStatus::Disabled;
        self.disabled_since = Some(now);
    }

    /// Reactivate a parked pool. Retired pools stay retired.
    pub fn enable(&mut self) {
        if self.is_retired() {
            return;
        }
        self.status = PoolStatus::Active;
        self.disabled_since = None;
    }

    pub fn ready_count(&self) -> usize {
        self.ready.len()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn finished_count(&self) -> usize {
        self.finished_count
    }

    pub fn slow_task_count(&self) -> usize {
        self.slow_task_count
    }

    pub fn has_ready_tasks(&self) -> bool {
        !self.ready.is_empty()
    }

    pub fn has_pending_tasks(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn has_tasks(&self) -> bool {
        self.has_ready_tasks() || self.has_pending_tasks()
    }

    /// Mean seconds per finished task over the pool's lifetime
    pub fn average_time_cost(&self) -> f64 {
        if self.finished_count == 0 {
            return 0.0;
        }
        self.total_cost.as_secs_f64() / self.finished_count as f64
    }

    /// Mean seconds per task over the most recent finishes
    pub fn average_recent_time_cost(&self) -> f64 {
        if self.recent_costs.is_empty() {
            return 0.0;
        }
        let total: Duration = self.recent_costs.iter().sum();
        total.as_secs_f64() / self.recent_costs.len() as f64
    }

    /// Finished tasks per second over the trailing throughput window.
    ///
    /// The window is shortened to the pool's age for young pools, but never
    /// below one second.
    pub fn average_throughput(&self, now: Instant) -> f64 {
        let window = self.settings.throughput_window;
        let recent = self
            .recent_finishes
            .iter()
            .filter(|&&t| now.saturating_duration_since(t) <= window)
            .count();
        let span = now
            .saturating_duration_since(self.created_at)
            .min(window)
            .max(Duration::from_secs(1));
        recent as f64 / span.as_secs_f64()
    }

    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.created_at)
    }
}

impl fmt::Display for TaskPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] ready={} pending={} finished={} slow={}",
            self.key,
            self.status,
            self.ready.len(),
            self.pending.len(),
            self.finished_count,
            self.slow_task_count
        )
    }
}

#[cfg(test)]
#[path = "pool_tests.rs"]
mod tests;
