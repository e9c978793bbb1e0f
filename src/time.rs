//! Time utilities.
//!
//! All persisted timestamps are Unix epoch values produced here so that
//! retention comparisons and message ordering agree on a single clock.

/// Returns the current Unix timestamp in seconds.
pub fn now_timestamp() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Returns the current Unix timestamp in milliseconds.
pub fn now_timestamp_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
