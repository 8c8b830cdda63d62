//! # LLM Retry Decorator
//!
//! Retry functionality for LLM operations, for the rate limiting and
//! transient errors that are common when working with hosted model APIs.
//!
//! - **Rate limits**: 429 responses are always retried.
//! - **Transient errors**: 500/502/503/504 are retried when the configuration
//!   says so (`only_retry_rate_limits == false`).
//! - **API-aware delays**: a Google `RetryInfo.retryDelay` hint replaces the
//!   computed backoff delay for that attempt.
//! - **Everything else** is permanent and returned after the first attempt.
//!
//! ```rust,ignore
//! use forgemail::llm::{RetryableLLM, LLM};
//! use forgemail::retry::RetryConfig;
//!
//! let mut llm = RetryableLLM::new(base_llm, RetryConfig::default());
//! let response = llm.prompt("Hello, world!".to_string()).await?;
//! ```

use crate::llm::core::{LLM, LLMError};
use crate::retry::RetryConfig;
use async_trait::async_trait;
use tracing::{debug, warn};

/// A wrapper for an LLM that adds retry logic driven by a [`RetryConfig`].
pub struct RetryableLLM<L: LLM> {
    llm: L,
    config: RetryConfig,
}

impl<L: LLM> RetryableLLM<L> {
    /// Creates a new `RetryableLLM`.
    pub fn new(llm: L, config: RetryConfig) -> Self {
        Self { llm, config }
    }

    /// Determines if an error should be retried under this configuration.
    fn should_retry(&self, error: &LLMError) -> bool {
        if self.config.only_retry_rate_limits {
            error.is_rate_limited()
        } else {
            error.is_transient()
        }
    }
}

#[async_trait]
impl<L: LLM + Send + Sync> LLM for RetryableLLM<L> {
    async fn prompt(&mut self, prompt: String) -> Result<String, LLMError> {
        let mut delays = self.config.delays();
        let mut attempt = 0usize;

        loop {
            attempt += 1;
            let error = match self.llm.prompt(prompt.clone()).await {
                Ok(result) => return Ok(result),
                Err(e) => e,
            };

            if !self.should_retry(&error) {
                debug!(attempt, error = %error, "Model error is not retryable");
                return Err(error);
            }

            let Some(backoff) = delays.next() else {
                warn!(attempt, error = %error, "Giving up on model call after retries");
                return Err(error);
            };

            let delay = error.retry_delay().unwrap_or(backoff);
            warn!(
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Transient model error, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::RetryStrategy;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct MockLLM {
        call_count: Arc<AtomicUsize>,
        error_on_call: Option<i64>,
        fail_first_n: Option<usize>,
    }

    impl MockLLM {
        fn new(call_count: Arc<AtomicUsize>) -> Self {
            Self {
                call_count,
                error_on_call: None,
                fail_first_n: None,
            }
        }

        fn with_error(mut self, error_code: i64) -> Self {
            self.error_on_call = Some(error_code);
            self
        }

        fn fail_first_n_calls(mut self, n: usize) -> Self {
            self.fail_first_n = Some(n);
            self
        }
    }

    #[async_trait]
    impl LLM for MockLLM {
        async fn prompt(&mut self, _prompt: String) -> Result<String, LLMError> {
            let count = self.call_count.fetch_add(1, Ordering::SeqCst) + 1;

            if let Some(fail_count) = self.fail_first_n {
                if count <= fail_count {
                    let error_json = serde_json::json!({
                        "error": {
                            "code": 429,
                            "message": "Rate limit exceeded",
                            "status": "RESOURCE_EXHAUSTED",
                            "details": [{
                                "@type": "type.googleapis.com/google.rpc.RetryInfo",
                                "retryDelay": "5ms"
                            }]
                        }
                    });
                    return Err(LLMError::PromptError(error_json.to_string()));
                }
                return Ok("Success after retries".to_string());
            }

            if let Some(error_code) = self.error_on_call {
                let error_json = serde_json::json!({
                    "error": {
                        "code": error_code,
                        "message": "An error occurred.",
                    }
                });
                Err(LLMError::PromptError(error_json.to_string()))
            } else {
                Ok("Success".to_string())
            }
        }
    }

    fn fast_config(attempts: usize) -> RetryConfig {
        RetryConfig::new(attempts, Duration::from_millis(1), RetryStrategy::Fixed)
    }

    #[tokio::test]
    async fn test_no_retry_on_success() {
        let call_count = Arc::new(AtomicUsize::new(0));
        let mock_llm = MockLLM::new(call_count.clone());
        let mut retryable_llm = RetryableLLM::new(mock_llm, fast_config(3));

        let result = retryable_llm.prompt("test".to_string()).await;

        assert!(result.is_ok());
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_on_429_error() {
        let call_count = Arc::new(AtomicUsize::new(0));
        let mock_llm = MockLLM::new(call_count.clone()).with_error(429);
        let mut retryable_llm = RetryableLLM::new(mock_llm, fast_config(3));

        let result = retryable_llm.prompt("test".to_string()).await;

        assert!(result.is_err());
        assert_eq!(call_count.load(Ordering::SeqCst), 4); // 1 initial call + 3 retries
    }

    #[tokio::test]
    async fn test_no_retry_on_503_when_rate_limits_only() {
        let call_count = Arc::new(AtomicUsize::new(0));
        let mock_llm = MockLLM::new(call_count.clone()).with_error(503);
        let mut retryable_llm = RetryableLLM::new(mock_llm, fast_config(3));

        let result = retryable_llm.prompt("test".to_string()).await;

        assert!(result.is_err());
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_on_503_when_all_transient_errors() {
        let call_count = Arc::new(AtomicUsize::new(0));
        let mock_llm = MockLLM::new(call_count.clone()).with_error(503);
        let mut retryable_llm =
            RetryableLLM::new(mock_llm, fast_config(2).retry_all_errors());

        let result = retryable_llm.prompt("test".to_string()).await;

        assert!(result.is_err());
        assert_eq!(call_count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_no_retry_on_permanent_error() {
        let call_count = Arc::new(AtomicUsize::new(0));
        let mock_llm = MockLLM::new(call_count.clone()).with_error(400);
        let mut retryable_llm =
            RetryableLLM::new(mock_llm, fast_config(3).retry_all_errors());

        let result = retryable_llm.prompt("test".to_string()).await;

        assert!(result.is_err());
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_success_after_retries() {
        let call_count = Arc::new(AtomicUsize::new(0));
        let mock_llm = MockLLM::new(call_count.clone()).fail_first_n_calls(2);
        let mut retryable_llm = RetryableLLM::new(mock_llm, fast_config(3));

        let result = retryable_llm.prompt("test".to_string()).await;

        assert_eq!(result.unwrap(), "Success after retries");
        assert_eq!(call_count.load(Ordering::SeqCst), 3); // 2 failed + 1 success
    }

    #[tokio::test]
    async fn test_disabled_config_makes_a_single_attempt() {
        let call_count = Arc::new(AtomicUsize::new(0));
        let mock_llm = MockLLM::new(call_count.clone()).with_error(429);
        let mut retryable_llm = RetryableLLM::new(mock_llm, RetryConfig::disabled());

        let result = retryable_llm.prompt("test".to_string()).await;

        assert!(result.is_err());
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
    }
}
