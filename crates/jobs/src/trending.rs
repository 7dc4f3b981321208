use chrono::{DateTime, Duration, Utc};

/// Applications inside the window needed for a job to turn hot.
pub const APPLICATION_THRESHOLD: u64 = 10;
/// Trailing window, in days, over which applications are counted.
pub const DAYS_THRESHOLD: i64 = 1;
/// How long a job stays hot once promoted.
pub const HOT_DURATION_DAYS: i64 = 7;

/// Thresholds shared by the daily sweep and the per-application check,
/// so both reach the same verdict for the same data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrendingPolicy {
    pub application_threshold: u64,
    pub window: Duration,
    pub hot_duration: Duration,
}

impl Default for TrendingPolicy {
    fn default() -> Self {
        Self::new(APPLICATION_THRESHOLD, DAYS_THRESHOLD, HOT_DURATION_DAYS)
    }
}

impl TrendingPolicy {
    pub fn new(application_threshold: u64, window_days: i64, hot_duration_days: i64) -> Self {
        Self {
            application_threshold,
            window: Duration::days(window_days),
            hot_duration: Duration::days(hot_duration_days),
        }
    }

    pub fn window_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.window
    }

    pub fn hot_until(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + self.hot_duration
    }

    pub fn qualifies(&self, recent_applications: u64) -> bool {
        recent_applications >= self.application_threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_constants() {
        let policy = TrendingPolicy::default();
        assert_eq!(policy.application_threshold, 10);
        assert_eq!(policy.window, Duration::days(1));
        assert_eq!(policy.hot_duration, Duration::days(7));
    }

    #[test]
    fn threshold_is_inclusive() {
        let policy = TrendingPolicy::default();
        assert!(!policy.qualifies(9));
        assert!(policy.qualifies(10));
    }

    #[test]
    fn window_bounds() {
        let policy = TrendingPolicy::new(3, 2, 5);
        let now = Utc::now();
        assert_eq!(policy.window_start(now), now - Duration::days(2));
        assert_eq!(policy.hot_until(now), now + Duration::days(5));
    }
}
