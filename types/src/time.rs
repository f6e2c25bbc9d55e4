//! Timestamp type used throughout the workflow.
//!
//! Timestamps are Unix epoch seconds (UTC). Evidence freshness and
//! submission-frequency checks compare timestamps supplied by callers, so
//! handlers pass an explicit `now` instead of reading the system clock.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// A Unix timestamp in seconds since epoch (UTC).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(u64);

impl Timestamp {
    /// The epoch (time zero).
    pub const EPOCH: Self = Self(0);

    pub fn new(secs: u64) -> Self {
        Self(secs)
    }

    /// Get the current system time as a `Timestamp`.
    pub fn now() -> Self {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock before Unix epoch")
            .as_secs();
        Self(secs)
    }

    pub fn as_secs(&self) -> u64 {
        self.0
    }

    /// Seconds elapsed since this timestamp (relative to `now`).
    /// Saturates at zero if this timestamp is in the future.
    pub fn elapsed_since(&self, now: Timestamp) -> u64 {
        now.0.saturating_sub(self.0)
    }

    /// Absolute difference in seconds between two timestamps.
    pub fn abs_diff(&self, other: Timestamp) -> u64 {
        self.0.abs_diff(other.0)
    }

    /// Whether this timestamp + duration has passed relative to `now`.
    pub fn has_expired(&self, duration_secs: u64, now: Timestamp) -> bool {
        now.0 >= self.0.saturating_add(duration_secs)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elapsed_saturates_for_future_timestamps() {
        let future = Timestamp::new(1000);
        assert_eq!(future.elapsed_since(Timestamp::new(500)), 0);
        assert_eq!(Timestamp::new(500).elapsed_since(future), 500);
    }

    #[test]
    fn expiry_is_inclusive_of_the_deadline() {
        let start = Timestamp::new(100);
        assert!(!start.has_expired(50, Timestamp::new(149)));
        assert!(start.has_expired(50, Timestamp::new(150)));
    }

    #[test]
    fn abs_diff_is_symmetric() {
        let a = Timestamp::new(10);
        let b = Timestamp::new(35);
        assert_eq!(a.abs_diff(b), 25);
        assert_eq!(b.abs_diff(a), 25);
    }
}
