use crate::llm::core::LLM;
use crate::llm::decorators::RetryableLLM;
use crate::retry::RetryConfig;

/// Factory for creating LLM instances with optional decorators.
///
/// Wraps base LLM implementations with decorators (retry) based on
/// configuration, so call sites only ever see a `Box<dyn LLM>`.
pub struct LLMFactory;

impl LLMFactory {
    /// Create an LLM instance with optional retry decoration.
    ///
    /// * `base_llm` - The base LLM implementation to potentially wrap
    /// * `retry_config` - Optional retry configuration. `None`, or a
    ///   configuration with `max_attempts == 0`, returns the base LLM as is.
    pub fn create(base_llm: Box<dyn LLM>, retry_config: Option<RetryConfig>) -> Box<dyn LLM> {
        match retry_config {
            Some(config) if config.max_attempts > 0 => {
                tracing::debug!(
                    max_attempts = config.max_attempts,
                    base_delay_ms = config.base_delay.as_millis() as u64,
                    strategy = ?config.strategy,
                    only_rate_limits = config.only_retry_rate_limits,
                    "Wrapping LLM with retry decorator"
                );
                Box::new(RetryableLLM::new(base_llm, config))
            }
            Some(_) => {
                tracing::debug!(
                    "Retry config provided but max_attempts is 0, using base LLM without retry"
                );
                base_llm
            }
            None => {
                tracing::debug!("No retry config provided, using base LLM without retry");
                base_llm
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LLMError;
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct MockLLM {
        name: String,
        calls: Arc<AtomicUsize>,
        rate_limited: bool,
    }

    impl MockLLM {
        fn new(name: &str, calls: Arc<AtomicUsize>) -> Self {
            Self {
                name: name.to_string(),
                calls,
                rate_limited: false,
            }
        }
    }

    #[async_trait]
    impl LLM for MockLLM {
        async fn prompt(&mut self, prompt: String) -> Result<String, LLMError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.rate_limited {
                return Err(LLMError::PromptError(
                    r#"{"error":{"code":429,"message":"slow down"}}"#.to_string(),
                ));
            }
            Ok(format!("{}: {}", self.name, prompt))
        }
    }

    #[tokio::test]
    async fn test_create_without_retry_config() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut llm = LLMFactory::create(Box::new(MockLLM::new("base", calls)), None);

        let result = llm.prompt("test".to_string()).await;
        assert_eq!(result.unwrap(), "base: test");
    }

    #[tokio::test]
    async fn test_create_with_default_retry_config() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut llm = LLMFactory::create(
            Box::new(MockLLM::new("base", calls)),
            Some(RetryConfig::default()),
        );

        let result = llm.prompt("test".to_string()).await;
        assert_eq!(result.unwrap(), "base: test");
    }

    #[tokio::test]
    async fn test_retry_config_is_applied() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut base = MockLLM::new("base", calls.clone());
        base.rate_limited = true;
        let config = RetryConfig::new(2, Duration::from_millis(1), crate::retry::RetryStrategy::Fixed);
        let mut llm = LLMFactory::create(Box::new(base), Some(config));

        assert!(llm.prompt("test".to_string()).await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_create_with_disabled_retry() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut base = MockLLM::new("base", calls.clone());
        base.rate_limited = true;
        let mut llm = LLMFactory::create(Box::new(base), Some(RetryConfig::disabled()));

        assert!(llm.prompt("test".to_string()).await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
