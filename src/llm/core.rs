use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

const GOOGLE_RETRY_INFO: &str = "type.googleapis.com/google.rpc.RetryInfo";

/// A custom error type for LLM operations.
///
/// Provider failures are carried as text. When the provider returned a
/// Google-style JSON error body, [`LLMError::status_code`] and
/// [`LLMError::retry_delay`] extract the interesting bits from it.
#[derive(Error, Debug)]
pub enum LLMError {
    /// An error occurred while prompting the model.
    #[error("Failed to prompt the model: {0}")]
    PromptError(String),
}

impl LLMError {
    fn message(&self) -> &str {
        match self {
            LLMError::PromptError(message) => message,
        }
    }

    fn json_body(&self) -> Option<Value> {
        let message = self.message();
        let start = message.find('{')?;
        let end = message.rfind('}')?;
        serde_json::from_str(&message[start..=end]).ok()
    }

    /// The HTTP-like status code reported by the provider, if any.
    pub fn status_code(&self) -> Option<u16> {
        if let Some(json) = self.json_body() {
            if let Some(code) = json["error"]["code"].as_u64() {
                return u16::try_from(code).ok();
            }
        }
        let message = self.message();
        [
            (429, "Too Many Requests"),
            (500, "Internal Server Error"),
            (502, "Bad Gateway"),
            (503, "Service Unavailable"),
            (504, "Gateway Timeout"),
        ]
        .into_iter()
        .find(|(_, phrase)| message.contains(phrase))
        .map(|(code, _)| code)
    }

    /// Whether the provider rejected the call because of rate limiting.
    pub fn is_rate_limited(&self) -> bool {
        self.status_code() == Some(429)
    }

    /// Whether the failure is worth retrying at all.
    pub fn is_transient(&self) -> bool {
        matches!(self.status_code(), Some(429 | 500 | 502 | 503 | 504))
    }

    /// The `retryDelay` hint of a Google API error response.
    pub fn retry_delay(&self) -> Option<Duration> {
        let json = self.json_body()?;
        json["error"]["details"]
            .as_array()?
            .iter()
            .filter(|detail| detail["@type"].as_str() == Some(GOOGLE_RETRY_INFO))
            .filter_map(|detail| detail["retryDelay"].as_str())
            .find_map(|delay| humantime::parse_duration(delay).ok())
    }
}

/// A trait that defines the contract for any LLM processor the agent can use.
///
/// Both the planner model driving the agent loop and the summarization model
/// used by the email tools go through this trait, so tests substitute scripted
/// fakes for the hosted services.
///
/// # Examples
///
/// ```rust
/// use forgemail::llm::{LLM, LLMError};
/// use async_trait::async_trait;
///
/// struct EchoLLM;
///
/// #[async_trait]
/// impl LLM for EchoLLM {
///     async fn prompt(&mut self, text: String) -> Result<String, LLMError> {
///         Ok(format!("echo: {}", text))
///     }
/// }
/// ```
#[async_trait]
pub trait LLM: Send + Sync {
    /// Sends a text prompt to the language model and gets a response.
    async fn prompt(&mut self, text: String) -> Result<String, LLMError>;
}

#[async_trait]
impl LLM for Box<dyn LLM> {
    async fn prompt(&mut self, text: String) -> Result<String, LLMError> {
        (**self).prompt(text).await
    }
}
