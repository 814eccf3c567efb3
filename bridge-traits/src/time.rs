//! Time source abstraction.

use chrono::{DateTime, Utc};

/// Time source trait
///
/// Abstracts wall-clock time so cache expiry can be tested without sleeping.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::time::Clock;
///
/// fn is_stale(clock: &dyn Clock, fetched_at_ms: i64, ttl_ms: i64) -> bool {
///     clock.unix_timestamp_millis() - fetched_at_ms >= ttl_ms
/// }
/// ```
pub trait Clock: Send + Sync {
    /// Get current UTC time
    fn now(&self) -> DateTime<Utc>;

    /// Get current Unix timestamp in milliseconds
    fn unix_timestamp_millis(&self) -> i64 {
        self.now().timestamp_millis()
    }
}

/// System clock implementation using actual system time
#[derive(Debug, Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock() {
        let clock = SystemClock;
        let before = Utc::now().timestamp_millis();
        let now = clock.unix_timestamp_millis();

        assert!(now >= before);
    }
}
