// The `mail` module is the boundary to the mail service: the operations the
// assistant consumes, the raw payload model, and the decoding helpers.

pub mod decoder;
pub mod gmail;
pub mod outgoing;
pub mod query;
pub mod retry;

use crate::utils::google_auth::AuthError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use decoder::{DecodeError, MAX_PART_CHARS, PLAIN_TEXT_MIME, decode};
pub use gmail::GmailMailService;
pub use outgoing::{OutgoingError, OutgoingMessage};
pub use query::Query;
pub use retry::RetryingMailService;

/// Errors reported by the mail service.
#[derive(Error, Debug)]
pub enum MailServiceError {
    /// Network failures, timeouts, rate limits and 5xx responses.
    #[error("Transient mail service error: {0}")]
    Transient(String),
    /// Everything the service will keep rejecting: bad recipient, quota,
    /// permissions, unknown message id.
    #[error("Mail service error: {0}")]
    Permanent(String),
    /// The bearer credential could not be obtained.
    #[error("Mail service authorization failed: {0}")]
    Auth(#[from] AuthError),
}

impl MailServiceError {
    pub fn is_transient(&self) -> bool {
        matches!(self, MailServiceError::Transient(_))
    }
}

/// Body of a message part. `data` is base64url encoded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

/// A raw message payload: either a single part with a body, or a container
/// with an ordered list of sub-parts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePart {
    #[serde(default)]
    pub mime_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<MessageBody>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parts: Option<Vec<MessagePart>>,
}

impl MessagePart {
    /// A leaf part carrying already-encoded body data.
    pub fn leaf(mime_type: &str, data: Option<String>) -> Self {
        Self {
            mime_type: mime_type.to_string(),
            body: Some(MessageBody { data }),
            parts: None,
        }
    }

    /// A container part with the given children.
    pub fn multipart(mime_type: &str, parts: Vec<MessagePart>) -> Self {
        Self {
            mime_type: mime_type.to_string(),
            body: None,
            parts: Some(parts),
        }
    }
}

/// The operations the assistant needs from a mail service.
#[async_trait]
pub trait MailService: Send + Sync {
    /// Ids of the messages matching `query`, newest first, at most `max_results`.
    async fn list_messages(
        &self,
        query: &Query,
        max_results: u32,
    ) -> Result<Vec<String>, MailServiceError>;

    /// The full payload of one message.
    async fn get_message(&self, id: &str) -> Result<MessagePart, MailServiceError>;

    /// Submits a base64url-encoded RFC 5322 message.
    async fn send_message(&self, raw: &str) -> Result<(), MailServiceError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn payload_deserializes_from_gmail_json() {
        let payload: MessagePart = serde_json::from_value(json!({
            "mimeType": "multipart/alternative",
            "parts": [
                {"mimeType": "text/plain", "body": {"data": "SGk="}},
                {"mimeType": "text/html", "body": {"size": 12}}
            ]
        }))
        .unwrap();

        let parts = payload.parts.unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0], MessagePart::leaf("text/plain", Some("SGk=".to_string())));
        assert_eq!(parts[1].body, Some(MessageBody { data: None }));
    }

    #[test]
    fn only_transient_errors_are_transient() {
        assert!(MailServiceError::Transient("503".into()).is_transient());
        assert!(!MailServiceError::Permanent("404".into()).is_transient());
        assert!(!MailServiceError::Auth(AuthError::NoToken).is_transient());
    }
}
