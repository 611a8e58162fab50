//! Retry policy for throttled or transiently failing ARM requests.
//!
//! Azure Resource Manager answers with `429 Too Many Requests` when a
//! subscription exceeds its read/write quota, and occasionally with 5xx
//! gateway errors. Both are retried here; every other status is returned to
//! the caller untouched.
//!
//! # Example
//!
//! ```rust
//! use rustible_azure::retry::{BackoffStrategy, RetryPolicy};
//! use std::time::Duration;
//!
//! let policy = RetryPolicy::builder()
//!     .max_retries(5)
//!     .initial_delay(Duration::from_secs(1))
//!     .backoff(BackoffStrategy::Exponential { multiplier: 2.0 })
//!     .max_delay(Duration::from_secs(60))
//!     .build();
//!
//! assert!(policy.should_retry(429, 0));
//! assert!(!policy.should_retry(404, 0));
//! ```

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Backoff strategy for calculating delay between retries.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// Constant delay between retries.
    Constant,

    /// Linear backoff: delay = initial_delay * (attempt + 1)
    Linear,

    /// Exponential backoff: delay = initial_delay * multiplier^attempt
    Exponential {
        /// Multiplier for exponential growth (default: 2.0)
        multiplier: f64,
    },
}

impl Default for BackoffStrategy {
    fn default() -> Self {
        Self::Exponential { multiplier: 2.0 }
    }
}

impl BackoffStrategy {
    /// Calculate the delay for a given attempt number (0-indexed).
    pub fn calculate_delay(&self, attempt: u32, initial_delay: Duration) -> Duration {
        let base_millis = initial_delay.as_millis() as f64;

        let delay_millis = match self {
            Self::Constant => base_millis,
            Self::Linear => base_millis * (attempt as f64 + 1.0),
            Self::Exponential { multiplier } => base_millis * multiplier.powf(attempt as f64),
        };

        Duration::from_millis(delay_millis as u64)
    }
}

/// Retry policy applied by [`crate::arm::ArmClient`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    #[serde(with = "humantime_serde")]
    pub initial_delay: Duration,
    #[serde(with = "humantime_serde")]
    pub max_delay: Duration,
    pub backoff: BackoffStrategy,
    /// Add up to 25% random jitter to computed delays
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(60),
            backoff: BackoffStrategy::default(),
            jitter: true,
        }
    }
}

impl RetryPolicy {
    pub fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder::default()
    }

    /// A policy that never retries
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Whether a response with `status` on the given attempt should be retried
    pub fn should_retry(&self, status: u16, attempt: u32) -> bool {
        attempt < self.max_retries && is_transient_status(status)
    }

    /// Delay before the next attempt. A server-provided `Retry-After` wins
    /// over the computed backoff, capped at `max_delay` either way.
    pub fn delay_for(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        if let Some(delay) = retry_after {
            return delay.min(self.max_delay);
        }

        let delay = self
            .backoff
            .calculate_delay(attempt, self.initial_delay)
            .min(self.max_delay);

        if self.jitter && !delay.is_zero() {
            let extra = rand::thread_rng().gen_range(0..=delay.as_millis() as u64 / 4);
            (delay + Duration::from_millis(extra)).min(self.max_delay)
        } else {
            delay
        }
    }
}

/// Builder for [`RetryPolicy`]
#[derive(Debug, Default)]
pub struct RetryPolicyBuilder {
    policy: RetryPolicy,
}

impl RetryPolicyBuilder {
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.policy.max_retries = retries;
        self
    }

    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.policy.initial_delay = delay;
        self
    }

    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.policy.max_delay = delay;
        self
    }

    pub fn backoff(mut self, backoff: BackoffStrategy) -> Self {
        self.policy.backoff = backoff;
        self
    }

    pub fn jitter(mut self, jitter: bool) -> Self {
        self.policy.jitter = jitter;
        self
    }

    pub fn build(self) -> RetryPolicy {
        self.policy
    }
}

/// Throttling and gateway failures
pub fn is_transient_status(status: u16) -> bool {
    matches!(status, 408 | 429 | 500 | 502 | 503 | 504)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_backoff() {
        let strategy = BackoffStrategy::Exponential { multiplier: 2.0 };
        let initial = Duration::from_millis(100);
        assert_eq!(strategy.calculate_delay(0, initial), Duration::from_millis(100));
        assert_eq!(strategy.calculate_delay(1, initial), Duration::from_millis(200));
        assert_eq!(strategy.calculate_delay(3, initial), Duration::from_millis(800));
    }

    #[test]
    fn test_linear_and_constant_backoff() {
        let initial = Duration::from_millis(100);
        assert_eq!(
            BackoffStrategy::Linear.calculate_delay(2, initial),
            Duration::from_millis(300)
        );
        assert_eq!(
            BackoffStrategy::Constant.calculate_delay(5, initial),
            Duration::from_millis(100)
        );
    }

    #[test]
    fn test_should_retry_only_transient() {
        let policy = RetryPolicy::default();
        assert!(policy.should_retry(429, 0));
        assert!(policy.should_retry(503, 2));
        assert!(!policy.should_retry(503, 3));
        assert!(!policy.should_retry(400, 0));
        assert!(!policy.should_retry(404, 0));
    }

    #[test]
    fn test_retry_after_wins_but_is_capped() {
        let policy = RetryPolicy::builder()
            .max_delay(Duration::from_secs(10))
            .build();
        assert_eq!(
            policy.delay_for(0, Some(Duration::from_secs(3))),
            Duration::from_secs(3)
        );
        assert_eq!(
            policy.delay_for(0, Some(Duration::from_secs(300))),
            Duration::from_secs(10)
        );
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let policy = RetryPolicy::builder()
            .initial_delay(Duration::from_millis(400))
            .max_delay(Duration::from_secs(60))
            .jitter(true)
            .build();
        for _ in 0..50 {
            let delay = policy.delay_for(0, None);
            assert!(delay >= Duration::from_millis(400));
            assert!(delay <= Duration::from_millis(500));
        }
    }

    #[test]
    fn test_none_policy() {
        assert!(!RetryPolicy::none().should_retry(429, 0));
    }
}
