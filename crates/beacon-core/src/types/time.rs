//! Millisecond timestamp helpers.
//!
//! The local store keeps every timestamp as integer Unix milliseconds so
//! that ordering and range queries compare numbers, not strings.

use chrono::{DateTime, TimeZone, Utc};

/// Convert a timestamp to Unix milliseconds.
pub fn to_millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

/// Convert Unix milliseconds back to a timestamp.
///
/// Out-of-range values clamp to the Unix epoch.
pub fn from_millis(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}
