//! Inactivity auto-lock policy.
//!
//! Pure timeout arithmetic over millisecond Unix timestamps, so expiry
//! decisions are deterministic and testable without sleeping.

use std::time::Duration;

/// Default auto-lock timeout in minutes
pub const DEFAULT_TIMEOUT_MINUTES: u32 = 15;

/// Smallest configurable timeout in minutes
pub const MIN_TIMEOUT_MINUTES: u32 = 1;

/// Largest configurable timeout in minutes
pub const MAX_TIMEOUT_MINUTES: u32 = 120;

/// When to lock an idle vault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutoLockPolicy {
    timeout: Duration,
}

impl AutoLockPolicy {
    /// Policy with an exact timeout. Mostly useful in tests; user-facing
    /// configuration goes through [`AutoLockPolicy::from_minutes`].
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Policy from a minute count, clamped to the configurable range.
    pub fn from_minutes(minutes: u32) -> Self {
        let minutes = minutes.clamp(MIN_TIMEOUT_MINUTES, MAX_TIMEOUT_MINUTES);
        Self {
            timeout: Duration::from_secs(u64::from(minutes) * 60),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Whether a vault last touched at `last_activity_millis` has idled
    /// past the timeout as of `now_millis`. Exactly at the boundary
    /// counts as expired. A last-activity time in the future (clock
    /// skew) counts as fresh.
    pub fn is_expired(&self, last_activity_millis: i64, now_millis: i64) -> bool {
        let elapsed = now_millis.saturating_sub(last_activity_millis);
        elapsed >= 0 && elapsed >= self.timeout.as_millis() as i64
    }

    /// Time remaining before an idle vault locks, or `None` if already
    /// expired.
    pub fn time_until_lock(&self, last_activity_millis: i64, now_millis: i64) -> Option<Duration> {
        if self.is_expired(last_activity_millis, now_millis) {
            return None;
        }
        let elapsed = now_millis.saturating_sub(last_activity_millis).max(0);
        let remaining = self.timeout.as_millis() as i64 - elapsed;
        Some(Duration::from_millis(remaining.max(0) as u64))
    }
}

impl Default for AutoLockPolicy {
    fn default() -> Self {
        Self::from_minutes(DEFAULT_TIMEOUT_MINUTES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINUTE_MS: i64 = 60_000;

    #[test]
    fn test_default_is_fifteen_minutes() {
        let policy = AutoLockPolicy::default();
        assert_eq!(policy.timeout(), Duration::from_secs(15 * 60));
    }

    #[test]
    fn test_minutes_are_clamped() {
        assert_eq!(
            AutoLockPolicy::from_minutes(0).timeout(),
            Duration::from_secs(60)
        );
        assert_eq!(
            AutoLockPolicy::from_minutes(999).timeout(),
            Duration::from_secs(120 * 60)
        );
        assert_eq!(
            AutoLockPolicy::from_minutes(30).timeout(),
            Duration::from_secs(30 * 60)
        );
    }

    #[test]
    fn test_expiry_boundary() {
        let policy = AutoLockPolicy::from_minutes(15);
        let t0 = 1_700_000_000_000;
        assert!(!policy.is_expired(t0, t0));
        assert!(!policy.is_expired(t0, t0 + 15 * MINUTE_MS - 1));
        assert!(policy.is_expired(t0, t0 + 15 * MINUTE_MS));
        assert!(policy.is_expired(t0, t0 + 16 * MINUTE_MS));
    }

    #[test]
    fn test_future_activity_counts_as_fresh() {
        let policy = AutoLockPolicy::from_minutes(1);
        let t0 = 1_700_000_000_000;
        assert!(!policy.is_expired(t0 + 5_000, t0));
    }

    #[test]
    fn test_time_until_lock() {
        let policy = AutoLockPolicy::from_minutes(1);
        let t0 = 1_700_000_000_000;
        assert_eq!(
            policy.time_until_lock(t0, t0 + 15_000),
            Some(Duration::from_secs(45))
        );
        assert_eq!(policy.time_until_lock(t0, t0 + MINUTE_MS), None);
    }
}
