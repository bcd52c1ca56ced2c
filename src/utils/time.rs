use chrono::{DateTime, Duration, Utc};

/// Source of "now" for every time-dependent rule.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Whole seconds between two instants, clamped to zero and to `i32`.
pub fn elapsed_seconds(from: DateTime<Utc>, to: DateTime<Utc>) -> i32 {
    let secs = (to - from).num_seconds().max(0);
    i32::try_from(secs).unwrap_or(i32::MAX)
}

pub fn seconds(n: i32) -> Duration {
    Duration::seconds(n as i64)
}
