// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Seed feeder: reads `<url> [priority]` lines and produces them.

use fq_core::{Clock, JobId, Priority, WebPage};
use fq_engine::TaskMonitor;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::lifecycle::LifecycleError;

/// One line of a seeds file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Seed {
    pub url: String,
    pub priority: Priority,
}

/// Parse a seed line. Blank lines and `#` comments yield `None`; a missing
/// or malformed priority falls back to the default.
pub fn parse_seed_line(line: &str) -> Option<Seed> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }

    let mut parts = line.split_whitespace();
    let url = parts.next()?.to_string();
    let priority = match parts.next() {
        Some(p) => match p.parse::<i32>() {
            Ok(n) => Priority(n),
            Err(_) => {
                tracing::warn!(url = %url, priority = p, "bad priority, using default");
                Priority::DEFAULT
            }
        },
        None => Priority::DEFAULT,
    };
    Some(Seed { url, priority })
}

/// Produce every seed from `reader` until it ends or `stop` is set.
/// Returns the number of tasks queued.
pub fn feed<C: Clock>(
    monitor: &TaskMonitor<C>,
    job_id: &JobId,
    reader: impl BufRead,
    stop: &AtomicBool,
) -> usize {
    let mut produced = 0;
    for (lineno, line) in reader.lines().enumerate() {
        if stop.load(Ordering::SeqCst) {
            break;
        }
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!(line = lineno + 1, error = %e, "failed to read seed");
                break;
            }
        };
        let Some(seed) = parse_seed_line(&line) else {
            continue;
        };

        let page = Arc::new(WebPage::new(seed.url.clone()).with_priority(seed.priority));
        if monitor.produce_url(job_id.clone(), &seed.url, page) {
            produced += 1;
        }
    }
    produced
}

/// Open `path` and feed it from a background thread. The feeder marks the
/// monitor's feed complete when it finishes.
pub fn spawn_feeder<C: Clock>(
    monitor: Arc<TaskMonitor<C>>,
    job_id: JobId,
    path: &Path,
    stop: Arc<AtomicBool>,
) -> Result<JoinHandle<usize>, LifecycleError> {
    let file = File::open(path).map_err(|source| LifecycleError::Seeds {
        path: path.to_path_buf(),
        source,
    })?;
    let path: PathBuf = path.to_path_buf();

    std::thread::Builder::new()
        .name("feeder".to_string())
        .spawn(move || {
            let produced = feed(&*monitor, &job_id, BufReader::new(file), &stop);
            tracing::info!(path = %path.display(), produced, "seeds loaded");
            monitor.set_feeder_completed();
            produced
        })
        .map_err(|source| LifecycleError::Spawn {
            name: "feeder".to_string(),
            source,
        })
}

#[cfg(test)]
#[path = "feeder_tests.rs"]
mod tests;
