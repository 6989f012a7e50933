//! Retry policy with exponential backoff and jitter.

use std::time::Duration;

use rand::Rng;

/// How often and how patiently a single date is retried.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt. Total attempts = `max_retries + 1`.
    pub max_retries: u32,
    /// Delay before the first retry; doubles for each further retry.
    pub base_delay: Duration,
    /// Upper bound for a single delay.
    pub max_delay: Duration,
    /// Spread each delay by up to +/- 25%.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 4,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            jitter: true,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            ..Self::default()
        }
    }

    /// No retries at all.
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Delay before retry number `attempt` (0-based).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let scale = 2f64.powi(attempt.min(30) as i32);
        let seconds = (self.base_delay.as_secs_f64() * scale).min(self.max_delay.as_secs_f64());

        if self.jitter && seconds > 0.0 {
            let factor = rand::thread_rng().gen_range(0.75..=1.25);
            Duration::from_secs_f64(seconds * factor)
        } else {
            Duration::from_secs_f64(seconds)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_doubles_without_jitter() {
        let policy = RetryPolicy {
            jitter: false,
            ..RetryPolicy::new(4, Duration::from_secs(1))
        };

        assert_eq!(policy.delay_for_attempt(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_secs(8));
    }

    #[test]
    fn delay_is_capped() {
        let policy = RetryPolicy {
            jitter: false,
            max_delay: Duration::from_secs(5),
            ..RetryPolicy::new(10, Duration::from_secs(1))
        };

        assert_eq!(policy.delay_for_attempt(9), Duration::from_secs(5));
    }

    #[test]
    fn jitter_stays_within_a_quarter() {
        let policy = RetryPolicy::new(4, Duration::from_secs(4));

        for _ in 0..50 {
            let delay = policy.delay_for_attempt(0);
            assert!(delay >= Duration::from_secs(3));
            assert!(delay <= Duration::from_secs(5));
        }
    }

    #[test]
    fn zero_base_delay_never_sleeps() {
        let policy = RetryPolicy::new(3, Duration::ZERO);
        assert_eq!(policy.delay_for_attempt(2), Duration::ZERO);
    }
}
