//! Recency window policy.
//!
//! A report is eligible for the live view only while it is younger than
//! the configured window. Comparison is UTC-epoch based on both sides, so
//! there is no local-timezone arithmetic to get wrong.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

/// Default recency window: 24 hours.
pub const DEFAULT_RECENCY_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);

/// Decides which reports are young enough to display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecencyPolicy {
    window: Duration,
}

impl RecencyPolicy {
    /// Creates a policy with the given window.
    #[must_use]
    pub const fn new(window: Duration) -> Self {
        Self { window }
    }

    /// Returns the configured window.
    #[must_use]
    pub const fn window(&self) -> Duration {
        self.window
    }

    /// The window expressed in whole hours, rounded up, at least 1.
    /// Used by the snapshot fetcher's `hours` query parameter.
    #[must_use]
    pub const fn window_hours(&self) -> u32 {
        let hours = self.window.as_secs().div_ceil(3600);
        if hours == 0 {
            1
        } else if hours > u32::MAX as u64 {
            u32::MAX
        } else {
            hours as u32
        }
    }

    /// True iff `created_at` is strictly less than one window old at
    /// `now`. A timestamp in the future is considered recent; the server
    /// clock is authoritative for `created_at`.
    #[must_use]
    pub fn is_recent(&self, created_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        let age = now.signed_duration_since(created_at);
        age < TimeDelta::from_std(self.window).unwrap_or(TimeDelta::MAX)
    }
}

impl Default for RecencyPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_RECENCY_WINDOW)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn at(hour: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 2, hour, min, 0).unwrap()
    }

    #[test]
    fn inside_window_is_recent() {
        let policy = RecencyPolicy::default();
        assert!(policy.is_recent(at(1, 0), at(23, 0)));
    }

    #[test]
    fn exactly_one_window_old_is_stale() {
        let policy = RecencyPolicy::new(Duration::from_secs(3600));
        assert!(!policy.is_recent(at(1, 0), at(2, 0)));
    }

    #[test]
    fn older_than_window_is_stale() {
        let policy = RecencyPolicy::new(Duration::from_secs(3600));
        assert!(!policy.is_recent(at(0, 0), at(5, 0)));
    }

    #[test]
    fn future_timestamp_is_recent() {
        let policy = RecencyPolicy::default();
        assert!(policy.is_recent(at(12, 0), at(11, 0)));
    }

    #[test]
    fn window_hours_rounds_up_and_floors_at_one() {
        assert_eq!(RecencyPolicy::default().window_hours(), 24);
        assert_eq!(RecencyPolicy::new(Duration::from_secs(5400)).window_hours(), 2);
        assert_eq!(RecencyPolicy::new(Duration::from_secs(60)).window_hours(), 1);
        assert_eq!(RecencyPolicy::new(Duration::ZERO).window_hours(), 1);
    }
}
