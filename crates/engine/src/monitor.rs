// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task monitor: routes produced tasks into per-key pools and hands them
//! out to fetch workers.
//!
//! Every mutating operation runs under one lock over [`MonitorState`].
//! Counters are written under that lock and published through atomics so
//! read-only queries never contend with workers.

use crate::config::MonitorConfig;
use crate::error::PoolError;
use crate::pool::{PoolSettings, PoolStatus, TaskPool};
use crate::queue::{PoolQueue, RetiredWork};
use crate::report::{MonitorReport, PoolRow, ReportSink, ServedHost, SlowPool, TracingSink};
use crate::tracker::HostTracker;
use fq_core::{
    reverse_host, Clock, FetchTask, ItemId, ItemIdGen, JobId, PoolKey, Priority,
    SequentialItemIdGen, WebPage,
};
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// What a maintenance pass changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaintenanceSummary {
    /// Pools retired because their host is gone
    pub retired: usize,
    /// Drained pools parked after the feeder completed
    pub disabled: usize,
    /// Extended pools dropped for good
    pub collected: usize,
}

#[derive(Debug, Default)]
struct MonitorState {
    queue: PoolQueue,
    /// Priority of the most recent dispatch; `None` until the first one
    last_priority: Option<Priority>,
    /// Recent average cost per pool, for picking eviction candidates
    pool_costs: HashMap<PoolKey, f64>,
    /// Worker thread names that finished tasks, per host
    served: HashMap<String, BTreeSet<String>>,
}

pub struct TaskMonitor<C: Clock> {
    name: String,
    config: MonitorConfig,
    settings: PoolSettings,
    clock: C,
    tracker: Arc<dyn HostTracker>,
    sink: Arc<dyn ReportSink>,
    ids: Arc<dyn ItemIdGen>,
    feeder_completed: AtomicBool,
    closed: AtomicBool,
    ready_count: AtomicUsize,
    pending_count: AtomicUsize,
    finished_count: AtomicUsize,
    state: Mutex<MonitorState>,
}

fn saturating_sub(counter: &AtomicUsize, n: usize) {
    if n == 0 {
        return;
    }
    let _ = counter.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| {
        Some(v.saturating_sub(n))
    });
}

impl<C: Clock> TaskMonitor<C> {
    pub fn new(
        name: impl Into<String>,
        config: MonitorConfig,
        tracker: Arc<dyn HostTracker>,
        clock: C,
    ) -> Self {
        let name = name.into();
        tracing::info!(
            monitor = %name,
            fetch_mode = ?config.fetch_mode,
            pool_threads = config.pool_threads,
            group_mode = %config.group_mode,
            crawl_delay = ?config.crawl_delay,
            min_crawl_delay = ?config.min_crawl_delay,
            pending_timeout = ?config.pending_timeout,
            min_throughput = ?config.min_throughput,
            "task monitor created"
        );
        Self {
            name,
            settings: config.pool_settings(),
            config,
            clock,
            tracker,
            sink: Arc::new(TracingSink),
            ids: Arc::new(SequentialItemIdGen::new()),
            feeder_completed: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            ready_count: AtomicUsize::new(0),
            pending_count: AtomicUsize::new(0),
            finished_count: AtomicUsize::new(0),
            state: Mutex::new(MonitorState::default()),
        }
    }

    /// Send reports to `sink` instead of the log
    pub fn with_sink(mut self, sink: Arc<dyn ReportSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Allocate item ids for `produce_url` from `ids`
    pub fn with_id_gen(mut self, ids: Arc<dyn ItemIdGen>) -> Self {
        self.ids = ids;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn tracker(&self) -> &Arc<dyn HostTracker> {
        &self.tracker
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    // ── Feeder side ─────────────────────────────────────────────────────────

    /// Build a task for `url` and queue it.
    ///
    /// Priority comes from the page; the item id from the monitor's
    /// generator. URLs that do not parse are logged and dropped.
    pub fn produce_url(&self, job_id: JobId, url: &str, page: Arc<WebPage>) -> bool {
        let item_id = self.ids.next();
        match FetchTask::create(job_id, url, page, self.config.group_mode, item_id) {
            Some(task) => self.produce(task),
            None => {
                tracing::warn!(url, "dropping url without a usable host");
                false
            }
        }
    }

    /// Queue a task in the pool for its key.
    ///
    /// Returns `false` when the task was dropped: the monitor is closed, or
    /// its host or URL is gone.
    pub fn produce(&self, task: FetchTask) -> bool {
        if self.is_closed() {
            return false;
        }
        if self.tracker.is_gone(task.host()) || self.tracker.is_gone(task.url()) {
            tracing::info!(url = task.url(), host = task.host(), "dropping task for unreachable host");
            return false;
        }

        let now = self.clock.now();
        let key = task.key();
        let mut state = self.state.lock();
        let state = &mut *state;
        // close() may have run while we waited for the lock
        if self.is_closed() {
            return false;
        }

        let status = state.queue.find_extend(&key).map(TaskPool::status);
        match status {
            Some(PoolStatus::Active) => {}
            Some(PoolStatus::Disabled) => {
                state.queue.enable(&key);
                tracing::info!(pool = %key, "re-enabled pool");
            }
            Some(PoolStatus::Retired) => {
                // Late acks for the old pool become unknown items
                if let Some(old) = state.queue.remove(&key) {
                    saturating_sub(&self.pending_count, old.pending_count());
                    tracing::info!(pool = %key, abandoned = old.pending_count(), "replacing retired pool");
                }
                state.pool_costs.remove(&key);
                self.create_pool(state, key.clone(), now);
            }
            None => self.create_pool(state, key.clone(), now),
        }

        let Some(pool) = state.queue.find_mut(&key) else {
            return false;
        };
        match pool.produce(task) {
            Ok(()) => {
                self.ready_count.fetch_add(1, Ordering::SeqCst);
                state.pool_costs.entry(key).or_insert(0.0);
                true
            }
            Err(e @ PoolError::DuplicateItem { .. }) => {
                tracing::warn!(pool = %key, error = %e, "rejected task");
                false
            }
            Err(e) => {
                tracing::error!(pool = %key, error = %e, "rejected task");
                false
            }
        }
    }

    fn create_pool(&self, state: &mut MonitorState, key: PoolKey, now: Instant) {
        let pool = TaskPool::new(key, self.settings.clone(), now);
        tracing::info!(pool = %pool.key(), "pool created");
        state.queue.add(pool);
    }

    pub fn set_feeder_completed(&self) {
        self.feeder_completed.store(true, Ordering::SeqCst);
        tracing::info!(monitor = %self.name, "feeder completed");
    }

    pub fn is_feeder_completed(&self) -> bool {
        self.feeder_completed.load(Ordering::SeqCst)
    }

    // ── Worker side ─────────────────────────────────────────────────────────

    /// Hand out the next task in priority order.
    ///
    /// Withholds less urgent work while a more urgent pool still has tasks
    /// in flight. When no pool can dispatch, runs a maintenance pass and
    /// returns `None`.
    pub fn consume(&self) -> Option<FetchTask> {
        if self.is_closed() {
            return None;
        }

        let now = self.clock.now();
        let mut state = self.state.lock();
        let state = &mut *state;

        let Some(next) = state.queue.peek().map(TaskPool::priority) else {
            self.maintain_locked(state, now);
            return None;
        };
        if let Some(last) = state.last_priority {
            if next.is_less_urgent_than(last) && state.queue.has_prior_pending_tasks(next) {
                return None;
            }
        }

        for key in state.queue.ordered_keys() {
            if Self::is_gated(state, key.priority) || !self.tracker.is_reachable(&key.host) {
                continue;
            }
            let Some(pool) = state.queue.find_mut(&key) else {
                continue;
            };
            if let Some(task) = pool.consume(now) {
                self.on_dispatch(state, &task);
                return Some(task);
            }
        }

        self.maintain_locked(state, now);
        None
    }

    /// Hand out the next task of one pool, bypassing the priority scan.
    ///
    /// The dispatch still moves the priority watermark, so a pinned task
    /// from a less urgent pool lets [`consume`](Self::consume) hand out
    /// that priority while more urgent work is in flight. Priority gating
    /// holds only when no pinned dispatches are mixed in.
    pub fn consume_key(&self, key: &PoolKey) -> Option<FetchTask> {
        if self.is_closed() || !self.tracker.is_reachable(&key.host) {
            return None;
        }

        let now = self.clock.now();
        let mut state = self.state.lock();
        let state = &mut *state;
        let task = state.queue.find_mut(key)?.consume(now)?;
        self.on_dispatch(state, &task);
        Some(task)
    }

    fn is_gated(state: &MonitorState, priority: Priority) -> bool {
        state
            .last_priority
            .is_some_and(|last| priority.is_less_urgent_than(last))
            && state.queue.has_prior_pending_tasks(priority)
    }

    fn on_dispatch(&self, state: &mut MonitorState, task: &FetchTask) {
        saturating_sub(&self.ready_count, 1);
        self.pending_count.fetch_add(1, Ordering::SeqCst);

        let priority = task.priority();
        if let Some(last) = state.last_priority {
            if last != priority {
                tracing::info!(from = %last, to = %priority, "fetch priority changed");
            }
        }
        state.last_priority = Some(priority);
    }

    pub fn finish(&self, task: &FetchTask) -> bool {
        self.finish_item(&task.key(), task.item_id(), false)
    }

    /// Finish a task that failed fast; the pool's politeness clock is left alone
    pub fn finish_asap(&self, task: &FetchTask) -> bool {
        self.finish_item(&task.key(), task.item_id(), true)
    }

    /// Acknowledge a dispatched item.
    ///
    /// Unknown pools and items are logged and ignored, so duplicate or late
    /// acknowledgements are harmless. Returns `true` if the item was pending.
    pub fn finish_item(&self, key: &PoolKey, item_id: ItemId, asap: bool) -> bool {
        let now = self.clock.now();
        let mut state = self.state.lock();
        let state = &mut *state;

        let Some(pool) = state.queue.find_extend_mut(key) else {
            tracing::warn!(pool = %key, item = %item_id, "finish for unknown pool");
            return false;
        };
        if !pool.finish(item_id, asap, now) {
            tracing::warn!(pool = %key, item = %item_id, "finish for unknown item");
            return false;
        }

        saturating_sub(&self.pending_count, 1);
        self.finished_count.fetch_add(1, Ordering::SeqCst);

        // Retired pools only linger for acks; their cost no longer matters
        if !pool.is_retired() {
            state.pool_costs.insert(key.clone(), pool.average_recent_time_cost());
        }
        let thread = std::thread::current();
        let worker = thread.name().unwrap_or("unnamed");
        state
            .served
            .entry(key.host.clone())
            .or_default()
            .insert(worker.to_string());
        true
    }

    pub fn find_pending_task(&self, key: &PoolKey, item_id: ItemId) -> Option<FetchTask> {
        self.state
            .lock()
            .queue
            .find_extend(key)?
            .pending_task(item_id)
            .cloned()
    }

    // ── Reachability ────────────────────────────────────────────────────────

    pub fn track_success(&self, page: &WebPage) {
        self.tracker.track_success(page);
    }

    /// Record a failed fetch of `url`; if that takes the host down, retire
    /// its pools and force-reclaim everything else in flight.
    pub fn track_host_gone(&self, url: &str) -> bool {
        if !self.tracker.track_host_gone(url) {
            return false;
        }
        self.retune(true);
        true
    }

    // ── Maintenance ─────────────────────────────────────────────────────────

    /// Retire pools of gone hosts, reclaim stale pending tasks in the rest,
    /// then recount ready and pending work from the pools.
    pub fn retune(&self, force: bool) {
        let now = self.clock.now();
        let mut state = self.state.lock();
        let state = &mut *state;

        let unreachable: Vec<PoolKey> = state
            .queue
            .keys()
            .into_iter()
            .filter(|key| self.tracker.is_gone(&key.host))
            .collect();
        for key in &unreachable {
            state.queue.retire(key, true);
            state.pool_costs.remove(key);
        }

        let mut reclaimed = 0;
        for key in state.queue.keys() {
            if let Some(pool) = state.queue.find_mut(&key) {
                reclaimed += pool.retune(force, now);
            }
        }

        if !unreachable.is_empty() {
            let pools: Vec<String> = unreachable.iter().map(ToString::to_string).collect();
            tracing::info!(pools = %pools.join(", "), "retired unreachable pools");
        }
        if reclaimed > 0 {
            tracing::info!(reclaimed, force, "reclaimed pending tasks");
        }

        self.resync_counters(state);
    }

    /// Retire pools of gone hosts, park drained pools once the feeder is
    /// done, and drop extended pools nobody needs any more.
    pub fn maintain(&self) -> MaintenanceSummary {
        let now = self.clock.now();
        let mut state = self.state.lock();
        self.maintain_locked(&mut state, now)
    }

    fn maintain_locked(&self, state: &mut MonitorState, now: Instant) -> MaintenanceSummary {
        let mut summary = MaintenanceSummary::default();
        let feeder_completed = self.is_feeder_completed();

        for key in state.queue.keys() {
            let Some(pool) = state.queue.find(&key) else {
                continue;
            };
            let (ready, pending, finished) =
                (pool.ready_count(), pool.pending_count(), pool.finished_count());
            let has_tasks = pool.has_tasks();

            let status = if self.tracker.is_gone(&key.host) {
                if let Some(work) = state.queue.retire(&key, true) {
                    self.drop_work(work);
                }
                state.pool_costs.remove(&key);
                summary.retired += 1;
                PoolStatus::Retired
            } else if feeder_completed && !has_tasks {
                state.queue.disable(&key, now);
                summary.disabled += 1;
                PoolStatus::Disabled
            } else {
                continue;
            };

            tracing::info!(
                pool = %key,
                from = %PoolStatus::Active,
                to = %status,
                ready,
                pending,
                finished,
                "pool status changed"
            );
        }

        let collected = state
            .queue
            .collect_garbage(now, self.settings.pending_timeout);
        for key in &collected {
            state.pool_costs.remove(key);
        }
        if !collected.is_empty() {
            tracing::debug!(count = collected.len(), "collected extended pools");
        }
        summary.collected = collected.len();
        summary
    }

    fn drop_work(&self, work: RetiredWork) {
        saturating_sub(&self.ready_count, work.ready);
        saturating_sub(&self.pending_count, work.pending);
    }

    fn resync_counters(&self, state: &MonitorState) {
        self.ready_count
            .store(state.queue.total_ready(), Ordering::SeqCst);
        self.pending_count
            .store(state.queue.total_pending(), Ordering::SeqCst);
    }

    /// Evict the slowest pool if its throughput is under the floor.
    ///
    /// The candidate is the active pool with the highest recent average
    /// cost. An evicted pool is retired, drops a few pending tasks outright
    /// and loses all ready work. Returns the number of tasks dropped.
    pub fn try_clear_slowest_queue(&self) -> usize {
        let Some(floor) = self.config.min_throughput else {
            return 0;
        };

        let now = self.clock.now();
        let mut state = self.state.lock();
        let state = &mut *state;

        let queue = &state.queue;
        let candidate = state
            .pool_costs
            .iter()
            .filter(|(key, _)| queue.find(key).is_some_and(|p| p.finished_count() > 0))
            .max_by(|a, b| a.1.total_cmp(b.1).then_with(|| b.0.cmp(a.0)))
            .map(|(key, _)| key.clone());
        let Some(key) = candidate else {
            return 0;
        };
        state.pool_costs.remove(&key);

        let Some(pool) = state.queue.find_mut(&key) else {
            return 0;
        };
        let throughput = pool.average_throughput(now);
        if throughput >= floor {
            tracing::info!(
                pool = %key,
                ready = pool.ready_count(),
                pending = pool.pending_count(),
                finished = pool.finished_count(),
                slow = pool.slow_task_count(),
                cost = pool.average_time_cost(),
                throughput,
                "slowest pool is efficient enough"
            );
            return 0;
        }

        let (finished, slow, cost) = (
            pool.finished_count(),
            pool.slow_task_count(),
            pool.average_time_cost(),
        );
        let pending_dropped = pool.clear_pending_tasks_if_few(self.config.slow_pool_pending_limit);
        let work = state.queue.retire(&key, false).unwrap_or_default();
        let work = RetiredWork {
            ready: work.ready,
            pending: pending_dropped,
        };
        self.drop_work(work);

        tracing::info!(
            pool = %key,
            dropped_ready = work.ready,
            dropped_pending = work.pending,
            finished,
            slow,
            cost,
            throughput,
            floor,
            "evicted slowest pool"
        );
        work.ready + work.pending
    }

    /// Drop ready work from every pool. Returns the number of tasks dropped.
    pub fn clear_ready_tasks(&self) -> usize {
        let mut state = self.state.lock();
        let state = &mut *state;

        for (key, cost) in state.queue.cost_report(self.config.report_limit) {
            tracing::info!(pool = %key, cost, "pool cost");
        }

        let mut dropped = 0;
        for key in state.queue.keys() {
            if let Some(pool) = state.queue.find_mut(&key) {
                dropped += pool.clear_ready_queue();
            }
        }
        saturating_sub(&self.ready_count, dropped);
        tracing::info!(dropped, "cleared ready tasks");
        dropped
    }

    // ── Reporting ───────────────────────────────────────────────────────────

    /// Log the first `limit` pools in dispatch order and recount work
    pub fn dump(&self, limit: usize) {
        let mut state = self.state.lock();
        let state = &mut *state;

        tracing::info!(
            monitor = %self.name,
            active = state.queue.len(),
            extended = state.queue.extended_len(),
            "pool dump"
        );
        for key in state.queue.ordered_keys().into_iter().take(limit) {
            if let Some(pool) = state.queue.find(&key) {
                tracing::info!("  {}", pool);
            }
        }
        self.resync_counters(state);
    }

    /// Emit a report to the sink and ask the tracker for its own
    pub fn report(&self) {
        let report = self.snapshot();
        self.sink.emit(&report);
        self.tracker.report();
    }

    /// Current state as a report, without emitting it
    pub fn snapshot(&self) -> MonitorReport {
        let now = self.clock.now();
        let limit = self.config.report_limit;
        let state = self.state.lock();

        let pools: Vec<PoolRow> = state
            .queue
            .ordered_keys()
            .iter()
            .take(limit)
            .filter_map(|key| state.queue.find(key))
            .map(|pool| PoolRow::of(pool, now))
            .collect();
        let slowest: Vec<SlowPool> = state
            .queue
            .cost_report(limit)
            .into_iter()
            .map(|(key, recent_cost)| SlowPool {
                key: key.to_string(),
                recent_cost,
            })
            .collect();

        let mut served: Vec<ServedHost> = state
            .served
            .iter()
            .map(|(host, threads)| ServedHost {
                host: host.clone(),
                threads: threads.iter().cloned().collect(),
            })
            .collect();
        served.sort_by_cached_key(|s| reverse_host(&s.host));

        MonitorReport {
            name: self.name.clone(),
            epoch_ms: self.clock.epoch_ms(),
            active_pools: state.queue.len(),
            extended_pools: state.queue.extended_len(),
            ready: self.ready_task_count(),
            pending: self.pending_task_count(),
            finished: self.finished_task_count(),
            feeder_completed: self.is_feeder_completed(),
            pools,
            slowest,
            served,
        }
    }

    // ── Counters ────────────────────────────────────────────────────────────

    /// Number of active pools
    pub fn queue_count(&self) -> usize {
        self.state.lock().queue.len()
    }

    /// Ready plus pending tasks
    pub fn task_count(&self) -> usize {
        self.ready_task_count() + self.pending_task_count()
    }

    pub fn ready_task_count(&self) -> usize {
        self.ready_count.load(Ordering::SeqCst)
    }

    pub fn pending_task_count(&self) -> usize {
        self.pending_count.load(Ordering::SeqCst)
    }

    pub fn finished_task_count(&self) -> usize {
        self.finished_count.load(Ordering::SeqCst)
    }

    // ── Shutdown ────────────────────────────────────────────────────────────

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Report, drop every pool and zero the counters. Later calls do nothing.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::info!(
            monitor = %self.name,
            ready = self.ready_task_count(),
            pending = self.pending_task_count(),
            finished = self.finished_task_count(),
            "closing task monitor"
        );

        self.report();

        let mut state = self.state.lock();
        state.queue.clear();
        state.pool_costs.clear();
        state.served.clear();
        state.last_priority = None;
        self.ready_count.store(0, Ordering::SeqCst);
        self.pending_count.store(0, Ordering::SeqCst);
        self.finished_count.store(0, Ordering::SeqCst);
    }
}

#[cfg(test)]
#[path = "monitor_tests.rs"]
mod tests;
