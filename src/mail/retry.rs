use super::{MailService, MailServiceError, MessagePart, Query};
use crate::retry::RetryConfig;
use async_trait::async_trait;
use tokio_retry::RetryIf;
use tracing::warn;

/// A mail service decorator that retries transient failures of the read
/// operations with bounded backoff.
///
/// `send_message` is passed through untouched: a send that timed out may
/// still have been delivered, and retrying it could deliver it twice.
pub struct RetryingMailService<S: MailService> {
    inner: S,
    config: RetryConfig,
}

impl<S: MailService> RetryingMailService<S> {
    pub fn new(inner: S, config: RetryConfig) -> Self {
        Self { inner, config }
    }

    fn should_retry(operation: &'static str, error: &MailServiceError) -> bool {
        let retry = error.is_transient();
        if retry {
            warn!(operation, error = %error, "Transient mail service error, retrying");
        }
        retry
    }
}

#[async_trait]
impl<S: MailService> MailService for RetryingMailService<S> {
    async fn list_messages(
        &self,
        query: &Query,
        max_results: u32,
    ) -> Result<Vec<String>, MailServiceError> {
        let inner = &self.inner;
        RetryIf::start(
            self.config.delays(),
            move || inner.list_messages(query, max_results),
            |e: &MailServiceError| Self::should_retry("list_messages", e),
        )
        .await
    }

    async fn get_message(&self, id: &str) -> Result<MessagePart, MailServiceError> {
        let inner = &self.inner;
        RetryIf::start(
            self.config.delays(),
            move || inner.get_message(id),
            |e: &MailServiceError| Self::should_retry("get_message", e),
        )
        .await
    }

    async fn send_message(&self, raw: &str) -> Result<(), MailServiceError> {
        self.inner.send_message(raw).await
    }
}
