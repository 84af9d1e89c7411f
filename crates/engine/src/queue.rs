// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! All pools of a monitor, split into active and extended sets.
//!
//! Active pools are eligible for dispatch. The extended set holds pools that
//! are parked (disabled) or retired but still have tasks in flight, so late
//! acknowledgements can be routed. A key lives in at most one of the two.

use crate::pool::TaskPool;
use fq_core::{PoolKey, Priority};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// Work discarded when a pool is retired
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetiredWork {
    pub ready: usize,
    pub pending: usize,
}

#[derive(Debug, Default)]
pub struct PoolQueue {
    active: BTreeMap<PoolKey, TaskPool>,
    extended: BTreeMap<PoolKey, TaskPool>,
}

/// Dispatch order: most urgent first, then cheapest, then by key
fn dispatch_order(a: &TaskPool, b: &TaskPool) -> Ordering {
    a.priority()
        .cmp(&b.priority())
        .then_with(|| {
            a.average_recent_time_cost()
                .total_cmp(&b.average_recent_time_cost())
        })
        .then_with(|| a.key().cmp(b.key()))
}

impl PoolQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of active pools
    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    pub fn extended_len(&self) -> usize {
        self.extended.len()
    }

    /// Insert an active pool, replacing any pool under the same key
    pub fn add(&mut self, pool: TaskPool) {
        let key = pool.key().clone();
        self.extended.remove(&key);
        self.active.insert(key, pool);
    }

    /// Active pool for `key`
    pub fn find(&self, key: &PoolKey) -> Option<&TaskPool> {
        self.active.get(key)
    }

    pub fn find_mut(&mut self, key: &PoolKey) -> Option<&mut TaskPool> {
        self.active.get_mut(key)
    }

    /// Active or extended pool for `key`
    pub fn find_extend(&self, key: &PoolKey) -> Option<&TaskPool> {
        self.active.get(key).or_else(|| self.extended.get(key))
    }

    pub fn find_extend_mut(&mut self, key: &PoolKey) -> Option<&mut TaskPool> {
        match self.active.get_mut(key) {
            Some(pool) => Some(pool),
            None => self.extended.get_mut(key),
        }
    }

    /// Remove a pool from whichever set holds it
    pub fn remove(&mut self, key: &PoolKey) -> Option<TaskPool> {
        self.active.remove(key).or_else(|| self.extended.remove(key))
    }

    /// Move a disabled pool back to the active set.
    ///
    /// Returns `false` if no parked pool exists under `key`; retired pools
    /// are never re-enabled.
    pub fn enable(&mut self, key: &PoolKey) -> bool {
        match self.extended.get(key) {
            Some(pool) if !pool.is_retired() => {}
            _ => return false,
        }
        let Some(mut pool) = self.extended.remove(key) else {
            return false;
        };
        pool.enable();
        self.active.insert(key.clone(), pool);
        true
    }

    /// Park an active pool in the extended set
    pub fn disable(&mut self, key: &PoolKey, now: Instant) -> bool {
        let Some(mut pool) = self.active.remove(key) else {
            return false;
        };
        pool.disable(now);
        self.extended.insert(key.clone(), pool);
        true
    }

    /// Retire a pool and drop its ready work.
    ///
    /// With `abandon_pending` its in-flight work is dropped as well. A pool
    /// that still has in-flight work lingers in the extended set until it
    /// drains; otherwise it is removed outright.
    pub fn retire(&mut self, key: &PoolKey, abandon_pending: bool) -> Option<RetiredWork> {
        let mut pool = self.remove(key)?;
        pool.retire();

        let ready = pool.clear_ready_queue();
        let pending = if abandon_pending {
            pool.abandon_pending()
        } else {
            0
        };

        if pool.has_pending_tasks() {
            self.extended.insert(key.clone(), pool);
        }
        Some(RetiredWork { ready, pending })
    }

    /// The most urgent active pool with ready work
    pub fn peek(&self) -> Option<&TaskPool> {
        self.active
            .values()
            .filter(|p| p.has_ready_tasks())
            .min_by(|a, b| dispatch_order(a, b))
    }

    /// Snapshot of active keys in dispatch order
    pub fn ordered_keys(&self) -> Vec<PoolKey> {
        let mut pools: Vec<&TaskPool> = self.active.values().collect();
        pools.sort_by(|a, b| dispatch_order(a, b));
        pools.into_iter().map(|p| p.key().clone()).collect()
    }

    /// True if an active pool more urgent than `priority` has work in flight
    pub fn has_prior_pending_tasks(&self, priority: Priority) -> bool {
        // Keys sort by priority first, so the scan can stop early
        self.active
            .values()
            .take_while(|p| p.priority().is_more_urgent_than(priority))
            .any(|p| p.has_pending_tasks())
    }

    /// Active pools in key order
    pub fn pools(&self) -> impl Iterator<Item = &TaskPool> {
        self.active.values()
    }

    /// Disabled and lingering retired pools in key order
    pub fn extended_pools(&self) -> impl Iterator<Item = &TaskPool> {
        self.extended.values()
    }

    /// Snapshot of active keys in key order
    pub fn keys(&self) -> Vec<PoolKey> {
        self.active.keys().cloned().collect()
    }

    /// Snapshot of extended keys in key order
    pub fn extended_keys(&self) -> Vec<PoolKey> {
        self.extended.keys().cloned().collect()
    }

    /// Drop retired pools that drained and disabled pools parked longer
    /// than `linger`. Returns the keys dropped.
    pub fn collect_garbage(&mut self, now: Instant, linger: Duration) -> Vec<PoolKey> {
        let expired: Vec<PoolKey> = self
            .extended
            .values()
            .filter(|p| {
                if p.is_retired() {
                    !p.has_pending_tasks()
                } else {
                    !p.has_tasks()
                        && p.disabled_since()
                            .is_some_and(|since| now.saturating_duration_since(since) >= linger)
                }
            })
            .map(|p| p.key().clone())
            .collect();

        for key in &expired {
            self.extended.remove(key);
        }
        expired
    }

    /// Ready tasks across active and extended pools
    pub fn total_ready(&self) -> usize {
        self.active
            .values()
            .chain(self.extended.values())
            .map(|p| p.ready_count())
            .sum()
    }

    /// Pending tasks across active and extended pools
    pub fn total_pending(&self) -> usize {
        self.active
            .values()
            .chain(self.extended.values())
            .map(|p| p.pending_count())
            .sum()
    }

    /// Slowest active pools by recent average cost, slowest first
    pub fn cost_report(&self, limit: usize) -> Vec<(PoolKey, f64)> {
        let mut costs: Vec<(PoolKey, f64)> = self
            .active
            .values()
            .filter(|p| p.finished_count() > 0)
            .map(|p| (p.key().clone(), p.average_recent_time_cost()))
            .collect();
        costs.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        costs.truncate(limit);
        costs
    }

    pub fn clear(&mut self) {
        self.active.clear();
        self.extended.clear();
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
