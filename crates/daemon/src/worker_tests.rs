use super::*;
use fq_core::test_support::http_task;
use fq_core::{FakeClock, GroupMode};
use fq_engine::{FetchTaskTracker, HostTracker, MonitorConfig};
use parking_lot::Mutex;
use std::collections::HashMap;

/// Answers from a per-host script, recording each URL it sees
struct ScriptedFetcher {
    outcomes: HashMap<String, FetchOutcome>,
    seen: Mutex<Vec<String>>,
}

impl ScriptedFetcher {
    fn new(outcomes: &[(&str, FetchOutcome)]) -> Self {
        Self {
            outcomes: outcomes
                .iter()
                .map(|(host, o)| (host.to_string(), *o))
                .collect(),
            seen: Mutex::new(Vec::new()),
        }
    }
}

impl Fetcher for ScriptedFetcher {
    fn fetch(&self, task: &FetchTask) -> FetchOutcome {
        self.seen.lock().push(task.url().to_string());
        self.outcomes
            .get(task.host())
            .copied()
            .unwrap_or(FetchOutcome::Success)
    }
}

fn setup(max_failures: u32) -> (Arc<TaskMonitor<FakeClock>>, Arc<FetchTaskTracker>) {
    let config = MonitorConfig {
        pool_threads: 2,
        crawl_delay: Duration::ZERO,
        ..MonitorConfig::default()
    };
    let tracker = Arc::new(FetchTaskTracker::new(GroupMode::Host, max_failures));
    let monitor = TaskMonitor::new("worker-test", config, tracker.clone(), FakeClock::new());
    (Arc::new(monitor), tracker)
}

/// Run one worker on the current thread until the queue drains
fn drain<C: Clock>(monitor: &TaskMonitor<C>, fetcher: &dyn Fetcher) -> WorkerStats {
    let stop = AtomicBool::new(false);
    std::thread::scope(|s| {
        let worker = s.spawn(|| run_worker(monitor, fetcher, &stop, Duration::from_millis(1)));
        for _ in 0..2000 {
            if monitor.task_count() == 0 {
                break;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        stop.store(true, Ordering::SeqCst);
        worker.join().unwrap()
    })
}

#[test]
fn successful_fetches_are_acknowledged() {
    let (monitor, _) = setup(3);
    for item in 1..=3 {
        monitor.produce(http_task(1, "a.com", item));
    }
    let fetcher = ScriptedFetcher::new(&[]);

    let stats = drain(&*monitor, &fetcher);

    assert_eq!(stats.fetched, 3);
    assert_eq!(stats.total(), 3);
    assert_eq!(monitor.finished_task_count(), 3);
    assert_eq!(monitor.task_count(), 0);
    assert_eq!(fetcher.seen.lock().len(), 3);
}

#[test]
fn failures_are_released_without_delay() {
    let (monitor, tracker) = setup(3);
    monitor.produce(http_task(1, "flaky.com", 1));
    let fetcher = ScriptedFetcher::new(&[("flaky.com", FetchOutcome::Failed)]);

    let stats = drain(&*monitor, &fetcher);

    assert_eq!(stats.failed, 1);
    assert_eq!(monitor.task_count(), 0);
    assert_eq!(tracker.failure_count("flaky.com"), 0);
}

#[test]
fn unreachable_host_is_retired() {
    let (monitor, tracker) = setup(1);
    for item in 1..=4 {
        monitor.produce(http_task(1, "dead.com", item));
    }
    monitor.produce(http_task(1, "live.com", 1));
    let fetcher = ScriptedFetcher::new(&[("dead.com", FetchOutcome::HostUnreachable)]);

    let stats = drain(&*monitor, &fetcher);

    assert!(tracker.is_gone("dead.com"));
    assert_eq!(stats.fetched, 1);
    assert!(stats.unreachable >= 1);
    // Remaining dead.com work is dropped rather than fetched
    assert!(stats.unreachable < 4);
    assert_eq!(monitor.task_count(), 0);
}

#[test]
fn worker_exits_when_monitor_closes() {
    let (monitor, _) = setup(3);
    let fetcher = DryRunFetcher::default();
    let stop = AtomicBool::new(false);
    monitor.close();

    let stats = run_worker(&*monitor, &fetcher, &stop, Duration::from_millis(1));
    assert_eq!(stats, WorkerStats::default());
}

#[test]
fn spawned_workers_are_named() {
    let (monitor, _) = setup(3);
    let fetcher: Arc<dyn Fetcher> = Arc::new(DryRunFetcher::new(Duration::ZERO));
    let stop = Arc::new(AtomicBool::new(false));

    let handles = spawn_workers(3, &monitor, &fetcher, &stop, Duration::from_millis(1)).unwrap();
    let names: Vec<_> = handles
        .iter()
        .map(|h| h.thread().name().unwrap().to_string())
        .collect();
    assert_eq!(names, vec!["fetch-0", "fetch-1", "fetch-2"]);

    stop.store(true, Ordering::SeqCst);
    for handle in handles {
        handle.join().unwrap();
    }
}

#[test]
fn stats_accumulate() {
    let mut total = WorkerStats::default();
    total += WorkerStats {
        fetched: 2,
        failed: 1,
        unreachable: 0,
    };
    total += WorkerStats {
        fetched: 1,
        failed: 0,
        unreachable: 3,
    };
    assert_eq!(total.fetched, 3);
    assert_eq!(total.total(), 7);
}
