//! Bounded reconnection policy
//!
//! Dial failures and dropped sessions count the same. The delay between
//! attempts is fixed; once the ceiling is reached there is no further
//! attempt.

use std::time::Duration;

/// Retry ceiling and delay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Consecutive failures after which we give up
    pub ceiling: u32,
    /// Wait between a failure and the next dial
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            ceiling: crate::config::MAX_CONNECT_ATTEMPTS,
            delay: crate::config::RETRY_DELAY,
        }
    }
}

/// Consecutive-failure counter checked against a [`RetryPolicy`]
#[derive(Debug)]
pub struct ReconnectState {
    policy: RetryPolicy,
    consecutive_failures: u32,
}

impl ReconnectState {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            consecutive_failures: 0,
        }
    }

    /// Count one failure and return the new total
    pub fn record_failure(&mut self) -> u32 {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.consecutive_failures
    }

    /// Full connection established
    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// True once the ceiling has been reached
    pub fn is_exhausted(&self) -> bool {
        self.consecutive_failures >= self.policy.ceiling
    }

    pub fn delay(&self) -> Duration {
        self.policy.delay
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_values() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.ceiling, 100);
        assert_eq!(policy.delay, Duration::from_secs(10));
    }

    #[test]
    fn each_failure_counts_once() {
        let mut state = ReconnectState::new(RetryPolicy::default());
        for expected in 1..=5 {
            assert_eq!(state.record_failure(), expected);
        }
        assert_eq!(state.consecutive_failures(), 5);
    }

    #[test]
    fn success_resets_to_zero() {
        let mut state = ReconnectState::new(RetryPolicy::default());
        state.record_failure();
        state.record_failure();

        state.record_success();
        assert_eq!(state.consecutive_failures(), 0);

        state.record_success();
        assert_eq!(state.consecutive_failures(), 0);
    }

    #[test]
    fn exhausted_at_ceiling() {
        let mut state = ReconnectState::new(RetryPolicy {
            ceiling: 3,
            delay: Duration::from_millis(1),
        });

        state.record_failure();
        state.record_failure();
        assert!(!state.is_exhausted());

        state.record_failure();
        assert!(state.is_exhausted());
    }

    #[test]
    fn delay_does_not_grow() {
        let mut state = ReconnectState::new(RetryPolicy::default());
        let before = state.delay();
        state.record_failure();
        state.record_failure();
        assert_eq!(state.delay(), before);
    }
}
