//! Time utilities for timestamp operations.

use std::time::{SystemTime, UNIX_EPOCH};

use chrono::Utc;

/// Returns the current Unix timestamp in seconds.
#[inline]
pub fn now_ts_sec() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Returns the current time formatted for the `Date` response header
/// (RFC 1123, always GMT).
pub fn http_date() -> String {
    Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}
