//! # Exponential backoff
//!
//! Per-item backoff tracked outside the reconciler, in the `error_policy`
//! callback, so the schedule never blocks the watch/timer paths (§5, §9
//! "Rate limiting").

use std::time::Duration;

/// Doubling backoff capped at `max_seconds`, the shape `FibonacciBackoff`
/// takes in sibling controllers but with the doubling policy this
/// reconciler's queue wants.
///
/// ```
/// use secret_sync_controller::backoff::ExponentialBackoff;
///
/// let mut backoff = ExponentialBackoff::new(1, 60);
/// assert_eq!(backoff.next_backoff_seconds(), 1);
/// assert_eq!(backoff.next_backoff_seconds(), 2);
/// assert_eq!(backoff.next_backoff_seconds(), 4);
/// ```
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    min_seconds: u64,
    current: u64,
    max_seconds: u64,
}

impl ExponentialBackoff {
    #[must_use]
    pub fn new(min_seconds: u64, max_seconds: u64) -> Self {
        Self {
            min_seconds,
            current: min_seconds,
            max_seconds,
        }
    }

    pub fn next_backoff_seconds(&mut self) -> u64 {
        let result = self.current;
        self.current = std::cmp::min(self.current.saturating_mul(2), self.max_seconds);
        result
    }

    #[must_use]
    pub fn next_backoff(&mut self) -> Duration {
        Duration::from_secs(self.next_backoff_seconds())
    }

    pub fn reset(&mut self) {
        self.current = self.min_seconds;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doubles_and_caps() {
        let mut backoff = ExponentialBackoff::new(1, 10);
        assert_eq!(backoff.next_backoff_seconds(), 1);
        assert_eq!(backoff.next_backoff_seconds(), 2);
        assert_eq!(backoff.next_backoff_seconds(), 4);
        assert_eq!(backoff.next_backoff_seconds(), 8);
        assert_eq!(backoff.next_backoff_seconds(), 10);
        assert_eq!(backoff.next_backoff_seconds(), 10);
    }

    #[test]
    fn reset_restarts_sequence() {
        let mut backoff = ExponentialBackoff::new(2, 100);
        backoff.next_backoff_seconds();
        backoff.next_backoff_seconds();
        backoff.reset();
        assert_eq!(backoff.next_backoff_seconds(), 2);
    }
}
