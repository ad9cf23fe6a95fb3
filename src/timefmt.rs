//! Human readable durations and ETAs for notification bodies.

use chrono::{DateTime, Local};

use crate::config::constants::{SECONDS_PER_DAY, SECONDS_PER_HOUR, SECONDS_PER_MINUTE};

/// Rendered in place of a value that is not known yet.
pub const UNKNOWN: &str = "?";

/// Format a number of seconds as `"{h}h {m}min"`, or `"{d}d {h}h {m}min"`
/// once it reaches a full day. Leftover seconds are dropped and negative
/// input is treated as zero.
pub fn format_duration(seconds: i64) -> String {
    let seconds = seconds.max(0);
    let days = seconds / SECONDS_PER_DAY;
    let hours = seconds % SECONDS_PER_DAY / SECONDS_PER_HOUR;
    let minutes = seconds % SECONDS_PER_HOUR / SECONDS_PER_MINUTE;

    if days > 0 {
        format!("{}d {}h {}min", days, hours, minutes)
    } else {
        format!("{}h {}min", hours, minutes)
    }
}

/// Like [`format_duration`] but renders `?` for an unknown value.
pub fn format_optional_duration(seconds: Option<i64>) -> String {
    seconds
        .map(format_duration)
        .unwrap_or_else(|| UNKNOWN.to_string())
}

/// Format the completion time `eta` that lies `remaining_seconds` in the future.
///
/// Completions less than a day away only show `HH:MM`; anything further out
/// carries the full date.
pub fn format_eta(eta: DateTime<Local>, remaining_seconds: i64) -> String {
    if remaining_seconds >= SECONDS_PER_DAY {
        eta.format("%Y-%m-%d %H:%M").to_string()
    } else {
        eta.format("%H:%M").to_string()
    }
}
