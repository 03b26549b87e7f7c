//! # Fibonacci Backoff
//!
//! Retry delays for readiness subscriptions. The sequence grows more slowly
//! than an exponential one, so a synchronizer that restarts is picked up
//! again quickly without hammering it while it is down.
//!
//! Sequence with the default bounds: 5s, 5s, 10s, 15s, 25s, 40s, 60s (max).

use std::time::Duration;

/// Shortest delay between readiness retries
pub const MIN_RETRY_SECS: u64 = 5;
/// Longest delay between readiness retries
pub const MAX_RETRY_SECS: u64 = 60;

/// Fibonacci backoff calculator
///
/// Each delay is the sum of the previous two, capped at the maximum.
#[derive(Debug, Clone)]
pub struct FibonacciBackoff {
    /// Minimum backoff value in seconds (for reset)
    min_secs: u64,
    /// Previous backoff value in seconds
    prev_secs: u64,
    /// Current backoff value in seconds
    current_secs: u64,
    /// Maximum backoff value in seconds
    max_secs: u64,
}

impl FibonacciBackoff {
    /// Create a new Fibonacci backoff.
    ///
    /// `min_secs` is raised to [`MIN_RETRY_SECS`], and `max_secs` to `min_secs`.
    #[must_use]
    pub fn new(min_secs: u64, max_secs: u64) -> Self {
        let min_secs = min_secs.max(MIN_RETRY_SECS);
        Self {
            min_secs,
            prev_secs: 0,
            current_secs: min_secs,
            max_secs: max_secs.max(min_secs),
        }
    }

    /// Get the next backoff duration and advance the sequence
    pub fn next_backoff(&mut self) -> Duration {
        let result = self.current_secs;
        let next = self.prev_secs + self.current_secs;
        self.prev_secs = self.current_secs;
        self.current_secs = std::cmp::min(next, self.max_secs);
        Duration::from_secs(result)
    }

    /// Reset the backoff to the initial state
    pub fn reset(&mut self) {
        self.prev_secs = 0;
        self.current_secs = self.min_secs;
    }
}

impl Default for FibonacciBackoff {
    fn default() -> Self {
        Self::new(MIN_RETRY_SECS, MAX_RETRY_SECS)
    }
}
