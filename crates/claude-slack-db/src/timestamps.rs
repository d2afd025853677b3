//! Time stored as Unix seconds (floating), per §4.1 ("portability").

use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall-clock time as Unix seconds.
#[must_use]
pub fn now_seconds() -> f64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs_f64()).unwrap_or(0.0)
}

/// Hours elapsed between `timestamp` (Unix seconds) and `now` (Unix seconds).
#[must_use]
pub fn age_hours(timestamp: f64, now: f64) -> f64 {
    ((now - timestamp) / 3600.0).max(0.0)
}
