//! Time-related re-exports.
//!
//! Timer-driven code in the core (fade ticks, settle delays, library polling)
//! uses these so that tests can run under tokio's paused clock.

pub use tokio::time::{
    interval, sleep, sleep_until, timeout, Interval, MissedTickBehavior, Sleep, Timeout,
};

pub use std::time::{Duration, SystemTime, UNIX_EPOCH};
pub use tokio::time::Instant;

/// Builds an interval whose first tick fires after `period` rather than
/// immediately, and which skips missed ticks instead of bursting.
pub fn delayed_interval(period: Duration) -> Interval {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}
