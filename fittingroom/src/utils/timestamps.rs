//! Timestamp helpers.

use chrono::{DateTime, Utc};
use std::time::Duration;

/// Represents a timestamp that can be serialized/deserialized.
pub type Timestamp = DateTime<Utc>;

/// Returns the current UTC time as an ISO 8601 formatted string.
///
/// # Examples
///
/// ```
/// use fittingroom::utils::iso_timestamp;
///
/// let ts = iso_timestamp();
/// assert!(ts.contains('T'));
/// ```
#[must_use]
pub fn iso_timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.6f+00:00").to_string()
}

/// Returns the current UTC timestamp.
#[must_use]
pub fn now_utc() -> Timestamp {
    Utc::now()
}

/// Returns the current Unix time in whole seconds.
#[must_use]
pub fn unix_seconds() -> i64 {
    Utc::now().timestamp()
}

/// Returns how long ago `ts` was, or zero if it lies in the future.
#[must_use]
pub fn elapsed_since(ts: &Timestamp) -> Duration {
    (Utc::now() - *ts).to_std().unwrap_or(Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    #[test]
    fn test_unix_seconds_is_recent() {
        let secs = unix_seconds();
        // 2020-01-01T00:00:00Z
        assert!(secs > 1_577_836_800);
    }

    #[test]
    fn test_elapsed_since_past() {
        let ts = Utc::now() - ChronoDuration::seconds(5);
        assert!(elapsed_since(&ts) >= Duration::from_secs(4));
    }

    #[test]
    fn test_elapsed_since_future_is_zero() {
        let ts = Utc::now() + ChronoDuration::seconds(60);
        assert_eq!(elapsed_since(&ts), Duration::ZERO);
    }
}
