//! Login lockout policy.
//!
//! The counter and `locked_until` timestamp live on the user record; the
//! store increments atomically so two concurrent failures never under-count.
//! This module owns the thresholds and the clock comparison.

use chrono::{DateTime, Duration, Utc};

const DEFAULT_LOCKOUT_THRESHOLD: u32 = 5;
const DEFAULT_LOCKOUT_SECONDS: i64 = 30 * 60;

#[derive(Debug, Clone, Copy)]
pub struct LockoutPolicy {
    threshold: u32,
    duration_seconds: i64,
}

impl LockoutPolicy {
    #[must_use]
    pub fn new() -> Self {
        Self {
            threshold: DEFAULT_LOCKOUT_THRESHOLD,
            duration_seconds: DEFAULT_LOCKOUT_SECONDS,
        }
    }

    #[must_use]
    pub fn with_threshold(mut self, threshold: u32) -> Self {
        self.threshold = threshold;
        self
    }

    #[must_use]
    pub fn with_duration_seconds(mut self, seconds: i64) -> Self {
        self.duration_seconds = seconds;
        self
    }

    #[must_use]
    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    #[must_use]
    pub fn duration(&self) -> Duration {
        Duration::seconds(self.duration_seconds)
    }

    /// Seconds remaining on an active lock, or `None` once it has elapsed.
    /// Lockout auto-clears by time comparison alone; no write is needed.
    #[must_use]
    pub fn remaining_seconds(
        &self,
        locked_until: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Option<u64> {
        let until = locked_until?;
        if now >= until {
            return None;
        }
        u64::try_from((until - now).num_seconds().max(1)).ok()
    }
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_values() {
        let policy = LockoutPolicy::new();
        assert_eq!(policy.threshold(), 5);
        assert_eq!(policy.duration(), Duration::seconds(30 * 60));
    }

    #[test]
    fn builders_override_defaults() {
        let policy = LockoutPolicy::new()
            .with_threshold(3)
            .with_duration_seconds(60);
        assert_eq!(policy.threshold(), 3);
        assert_eq!(policy.duration(), Duration::seconds(60));
    }

    #[test]
    fn remaining_seconds_counts_down_and_clears() {
        let policy = LockoutPolicy::new();
        let now = Utc::now();

        assert_eq!(policy.remaining_seconds(None, now), None);

        let until = now + Duration::seconds(90);
        assert_eq!(policy.remaining_seconds(Some(until), now), Some(90));

        // Auto-clears once the window elapses.
        assert_eq!(policy.remaining_seconds(Some(until), until), None);
        assert_eq!(
            policy.remaining_seconds(Some(until), until + Duration::seconds(1)),
            None
        );
    }

    #[test]
    fn remaining_seconds_reports_at_least_one_while_locked() {
        let policy = LockoutPolicy::new();
        let now = Utc::now();
        let until = now + Duration::milliseconds(200);
        assert_eq!(policy.remaining_seconds(Some(until), now), Some(1));
    }
}
