// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Compact human-readable durations and rates for reports.

use std::time::Duration;

/// Format a duration as `"850ms"`, `"12s"`, `"3m"`, `"1h5m"` or `"2d"`.
///
/// Sub-second values keep millisecond precision; above that the largest
/// whole unit wins, with minutes kept alongside hours when non-zero.
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs == 0 {
        return format!("{}ms", d.as_millis());
    }
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m", secs / 60)
    } else if secs < 86400 {
        let h = secs / 3600;
        let m = (secs % 3600) / 60;
        if m > 0 {
            format!("{}h{}m", h, m)
        } else {
            format!("{}h", h)
        }
    } else {
        format!("{}d", secs / 86400)
    }
}

/// Format a pages-per-second rate with two decimals: `"0.25 p/s"`.
pub fn format_rate(pages_per_sec: f64) -> String {
    format!("{:.2} p/s", pages_per_sec)
}

#[cfg(test)]
#[path = "time_fmt_tests.rs"]
mod tests;
