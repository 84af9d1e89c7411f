// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::report::CollectingSink;
use crate::tracker::FetchTaskTracker;
use fq_core::test_support::http_task;
use fq_core::{FakeClock, GroupMode};

fn config(floor: Option<f64>) -> MonitorConfig {
    MonitorConfig {
        crawl_delay: Duration::ZERO,
        min_throughput: floor,
        retune_interval: Duration::from_secs(30),
        evict_interval: Duration::from_secs(60),
        report_interval: Duration::from_secs(300),
        ..MonitorConfig::default()
    }
}

fn monitor(clock: &FakeClock, config: MonitorConfig) -> (TaskMonitor<FakeClock>, Arc<CollectingSink>) {
    let sink = Arc::new(CollectingSink::new());
    let tracker = Arc::new(FetchTaskTracker::new(GroupMode::Host, 3));
    let monitor = TaskMonitor::new("test", config, tracker, clock.clone()).with_sink(sink.clone());
    (monitor, sink)
}

#[test]
fn eviction_is_armed_only_with_a_floor() {
    let clock = FakeClock::new();
    let timers = MaintenanceTimers::from_config(&config(None), clock.now());
    assert!(timers.is_armed(MaintenanceAction::Retune));
    assert!(!timers.is_armed(MaintenanceAction::Evict));
    assert!(timers.is_armed(MaintenanceAction::Report));

    let timers = MaintenanceTimers::from_config(&config(Some(0.5)), clock.now());
    assert!(timers.is_armed(MaintenanceAction::Evict));
}

#[test]
fn timers_fire_and_rearm() {
    let clock = FakeClock::new();
    let mut timers = MaintenanceTimers::from_config(&config(Some(0.5)), clock.now());

    clock.advance(Duration::from_secs(29));
    assert!(timers.fired(clock.now()).is_empty());

    clock.advance(Duration::from_secs(1));
    assert_eq!(timers.fired(clock.now()), vec![MaintenanceAction::Retune]);
    assert!(timers.fired(clock.now()).is_empty());

    clock.advance(Duration::from_secs(30));
    assert_eq!(
        timers.fired(clock.now()),
        vec![MaintenanceAction::Retune, MaintenanceAction::Evict]
    );
    assert_eq!(
        timers.next_deadline(),
        Some(clock.now() + Duration::from_secs(30))
    );
}

#[test]
fn oversized_interval_is_clamped() {
    let clock = FakeClock::new();
    let mut timers = MaintenanceTimers::new();
    timers.arm(MaintenanceAction::Report, Duration::MAX, clock.now());
    assert_eq!(timers.next_deadline(), Some(clock.now() + crate::MAX_DURATION));

    clock.advance(crate::MAX_DURATION);
    assert_eq!(timers.fired(clock.now()), vec![MaintenanceAction::Report]);
}

#[test]
fn disarmed_timer_never_fires() {
    let clock = FakeClock::new();
    let mut timers = MaintenanceTimers::new();
    timers.arm(MaintenanceAction::Report, Duration::from_secs(10), clock.now());
    timers.disarm(MaintenanceAction::Report);

    clock.advance(Duration::from_secs(60));
    assert!(timers.fired(clock.now()).is_empty());
    assert_eq!(timers.next_deadline(), None);
}

#[test]
fn action_names() {
    assert_eq!(MaintenanceAction::Retune.to_string(), "retune");
    assert_eq!(MaintenanceAction::Evict.to_string(), "evict");
    assert_eq!(MaintenanceAction::Report.to_string(), "report");
}

#[test]
fn retune_action_reclaims_stale_work() {
    let clock = FakeClock::new();
    let (monitor, _) = monitor(&clock, config(None));
    monitor.produce(http_task(1, "a.com", 1));
    monitor.consume().unwrap();

    clock.advance(Duration::from_secs(180));
    run_maintenance(&monitor, &[MaintenanceAction::Retune]);

    assert_eq!(monitor.ready_task_count(), 1);
    assert_eq!(monitor.pending_task_count(), 0);
}

#[test]
fn evict_action_drops_slow_pool() {
    let clock = FakeClock::new();
    let (monitor, _) = monitor(&clock, config(Some(1.0)));
    for item in 1..=3 {
        monitor.produce(http_task(1, "slow.com", item));
    }
    let task = monitor.consume().unwrap();
    clock.advance(Duration::from_secs(10));
    monitor.finish(&task);

    run_maintenance(&monitor, &[MaintenanceAction::Evict]);
    assert_eq!(monitor.queue_count(), 0);
    assert_eq!(monitor.task_count(), 0);
}

#[test]
fn report_action_emits_to_sink() {
    let clock = FakeClock::new();
    let (monitor, sink) = monitor(&clock, config(None));
    monitor.produce(http_task(1, "a.com", 1));

    run_maintenance(&monitor, &[MaintenanceAction::Report]);

    let report = sink.last().unwrap();
    assert_eq!(report.name, "test");
    assert_eq!(report.ready, 1);
    assert_eq!(report.active_pools, 1);
}

#[tokio::test]
async fn spawned_maintenance_runs_until_close() {
    let clock = FakeClock::new();
    let (monitor, sink) = monitor(&clock, config(None));
    let monitor = Arc::new(monitor);

    let handle = spawn_maintenance(Arc::clone(&monitor), Duration::from_millis(5));

    // The task arms its timers whenever it first runs, so keep time moving
    for _ in 0..200 {
        if !sink.is_empty() {
            break;
        }
        clock.advance(Duration::from_secs(300));
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(!sink.is_empty(), "report timer should have fired");

    monitor.close();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();
}
