//! Retry policy for transient provider failures

use std::time::Duration;

/// Exponential backoff configuration for retryable failures.
///
/// The delay before retry `n` (zero-based) is
/// `initial_delay * multiplier^n`, capped at `max_delay`. A resource is
/// attempted at most `max_attempts` times; exhausting the budget converts
/// the failure into a fatal one.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first
    pub max_attempts: u32,

    /// Delay before the first retry
    pub initial_delay: Duration,

    /// Upper bound on any single delay
    pub max_delay: Duration,

    /// Backoff multiplier per retry
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Backoff delay before retry number `retry` (zero-based)
    pub fn delay_for_attempt(&self, retry: u32) -> Duration {
        let millis = self.initial_delay.as_millis() as f64 * self.multiplier.powi(retry as i32);
        Duration::from_millis(millis as u64).min(self.max_delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doubles_until_capped() {
        let policy = RetryPolicy {
            max_attempts: 10,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(5),
            multiplier: 2.0,
        };

        assert_eq!(policy.delay_for_attempt(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_secs(4));
        // capped from here on
        assert_eq!(policy.delay_for_attempt(3), Duration::from_secs(5));
        assert_eq!(policy.delay_for_attempt(8), Duration::from_secs(5));
    }
}
