//! Small time helpers shared by the journal and the stores.

use std::time::{SystemTime, UNIX_EPOCH};

/// Returns the current wall-clock time in milliseconds since the Unix epoch.
///
/// A clock set before the epoch yields `0` rather than an error.
#[must_use]
pub fn current_time_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Returns the current wall-clock time in nanoseconds since the Unix epoch.
///
/// Used to stamp journal entries for point-in-time reads.
#[must_use]
pub fn current_time_nanos() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_helpers_are_consistent() {
        let millis = current_time_millis();
        let nanos = current_time_nanos();
        assert!(millis > 0);
        assert!(nanos / 1_000_000 >= millis);
    }
}
