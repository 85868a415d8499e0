//! Wall-clock helpers
//!
//! Liveness bookkeeping uses monotonic `tokio::time::Instant`s. Wall-clock
//! milliseconds only appear on the wire (heartbeat timestamps) and in
//! human-facing connection listings.

use std::time::{SystemTime, UNIX_EPOCH};

/// Current Unix timestamp in milliseconds.
///
/// A clock set before 1970 yields 0 rather than panicking; the value is
/// informational only.
pub fn current_time_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
