// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Time source abstraction.
//!
//! Everything in the scheduler that depends on time (politeness spacing,
//! pending timeouts, throughput windows, maintenance deadlines) reads it
//! through a [`Clock`] so tests can drive time by hand.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Source of monotonic and wall-clock time
pub trait Clock: Clone + Send + Sync + 'static {
    /// Monotonic now
    fn now(&self) -> Instant;

    /// Wall-clock milliseconds since the Unix epoch
    fn epoch_ms(&self) -> u64;
}

/// Real time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn epoch_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

#[derive(Debug)]
struct FakeTime {
    instant: Instant,
    epoch_ms: u64,
}

/// Manually advanced clock for tests.
///
/// Clones share the same underlying time, so a clock handed to a monitor
/// can still be advanced from the test body.
#[derive(Debug, Clone)]
pub struct FakeClock {
    time: Arc<Mutex<FakeTime>>,
}

impl FakeClock {
    pub fn new() -> Self {
        Self {
            time: Arc::new(Mutex::new(FakeTime {
                instant: Instant::now(),
                epoch_ms: 1_000_000,
            })),
        }
    }

    /// Move both the monotonic and the wall clock forward
    pub fn advance(&self, by: Duration) {
        let mut time = self.time.lock();
        time.instant += by;
        time.epoch_ms += by.as_millis() as u64;
    }

    pub fn set_epoch_ms(&self, epoch_ms: u64) {
        self.time.lock().epoch_ms = epoch_ms;
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Instant {
        self.time.lock().instant
    }

    fn epoch_ms(&self) -> u64 {
        self.time.lock().epoch_ms
    }
}

#[cfg(test)]
#[path = "clock_tests.rs"]
mod tests;
