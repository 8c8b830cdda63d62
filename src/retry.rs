use std::time::Duration;
use tokio_retry::strategy::{ExponentialBackoff, FixedInterval, jitter};

/// Configuration for retry behavior on transient failures.
///
/// The same configuration drives both the model decorator
/// ([`crate::llm::RetryableLLM`]) and the mail service decorator
/// ([`crate::mail::RetryingMailService`]).
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (0 means no retries)
    pub max_attempts: usize,
    /// Base delay for retry backoff strategy
    pub base_delay: Duration,
    /// The retry strategy to use
    pub strategy: RetryStrategy,
    /// Whether to only retry on rate limit (429) errors
    pub only_retry_rate_limits: bool,
}

/// Retry strategy for handling failed requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryStrategy {
    /// Fixed delay between retries
    Fixed,
    /// Exponential backoff without jitter
    ExponentialBackoff,
    /// Exponential backoff with jitter to avoid thundering herd
    ExponentialBackoffWithJitter,
}

/// Upper bound on a single backoff sleep.
const MAX_DELAY: Duration = Duration::from_secs(30);

impl Default for RetryConfig {
    /// - 3 retry attempts
    /// - 1 second base delay
    /// - Exponential backoff with jitter
    /// - Only retry on 429 rate limit errors
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
            strategy: RetryStrategy::ExponentialBackoffWithJitter,
            only_retry_rate_limits: true,
        }
    }
}

impl RetryConfig {
    /// Create a new retry configuration with custom parameters.
    pub fn new(max_attempts: usize, base_delay: Duration, strategy: RetryStrategy) -> Self {
        Self {
            max_attempts,
            base_delay,
            strategy,
            only_retry_rate_limits: true,
        }
    }

    /// Retry every transient error (5xx, timeouts), not just rate limits.
    pub fn retry_all_errors(mut self) -> Self {
        self.only_retry_rate_limits = false;
        self
    }

    /// Create a configuration with no retry (for explicit opt-out).
    pub fn disabled() -> Self {
        Self {
            max_attempts: 0,
            base_delay: Duration::from_millis(0),
            strategy: RetryStrategy::Fixed,
            only_retry_rate_limits: true,
        }
    }

    /// The sequence of delays to sleep between attempts.
    ///
    /// Yields exactly `max_attempts` durations, each capped at 30 seconds.
    pub fn delays(&self) -> Box<dyn Iterator<Item = Duration> + Send> {
        let base_ms = self.base_delay.as_millis().max(1) as u64;
        let take = self.max_attempts;
        match self.strategy {
            RetryStrategy::Fixed => Box::new(FixedInterval::new(self.base_delay).take(take)),
            RetryStrategy::ExponentialBackoff => Box::new(
                ExponentialBackoff::from_millis(2)
                    .factor(base_ms / 2 + 1)
                    .max_delay(MAX_DELAY)
                    .take(take),
            ),
            RetryStrategy::ExponentialBackoffWithJitter => Box::new(
                ExponentialBackoff::from_millis(2)
                    .factor(base_ms / 2 + 1)
                    .max_delay(MAX_DELAY)
                    .map(jitter)
                    .take(take),
            ),
        }
    }
}
