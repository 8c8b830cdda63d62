use crate::mail::{MailService, MailServiceError, OutgoingError, OutgoingMessage};
use rig::{completion::ToolDefinition, tool::Tool};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// Confirmation returned after a successful send.
pub const SEND_SUCCESS: &str = "Email sent successfully.";

#[derive(Debug, Error)]
pub enum SendEmailError {
    #[error("Invalid email: {0}")]
    Invalid(#[from] OutgoingError),
    #[error("Failed to send email: {0}")]
    Mail(#[from] MailServiceError),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SendEmailArgs {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Sends a plain-text email. Each call submits exactly one message.
#[derive(Clone)]
pub struct SendEmailTool {
    mail: Arc<dyn MailService>,
}

impl SendEmailTool {
    pub fn new(mail: Arc<dyn MailService>) -> Self {
        Self { mail }
    }

    pub async fn send(&self, to: &str, subject: &str, body: &str) -> Result<String, SendEmailError> {
        let message = OutgoingMessage::new(to, subject, body)?;
        self.mail.send_message(&message.encode()).await?;
        info!(to = %message.to(), "Email sent");
        Ok(SEND_SUCCESS.to_string())
    }
}

impl Tool for SendEmailTool {
    const NAME: &'static str = "SendEmail";

    type Args = SendEmailArgs;
    type Error = SendEmailError;
    type Output = String;

    async fn definition(&self, _prompt: String) -> ToolDefinition {
        ToolDefinition {
            name: Self::NAME.to_string(),
            description: "Send an email to a recipient".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "to": {
                        "type": "string",
                        "description": "Recipient email address."
                    },
                    "subject": {
                        "type": "string",
                        "description": "Subject line."
                    },
                    "body": {
                        "type": "string",
                        "description": "Plain-text message body."
                    }
                },
                "required": ["to", "subject", "body"]
            }),
        }
    }

    async fn call(&self, args: Self::Args) -> Result<Self::Output, Self::Error> {
        self.send(&args.to, &args.subject, &args.body).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FakeMailService;
    use base64::Engine;
    use base64::engine::general_purpose::URL_SAFE;

    #[tokio::test]
    async fn sends_one_mime_message() {
        let fake = FakeMailService::default();
        let tool = SendEmailTool::new(Arc::new(fake.clone()));

        let result = tool.send("x@y.com", "S", "B").await.unwrap();

        assert_eq!(result, SEND_SUCCESS);
        assert_eq!(fake.send_calls(), 1);
        let raw = URL_SAFE.decode(&fake.sent()[0]).unwrap();
        let mime = String::from_utf8(raw).unwrap();
        assert!(mime.contains("To: x@y.com\r\n"));
        assert!(mime.contains("Subject: S\r\n"));
        assert!(mime.ends_with("\r\n\r\nB"));
    }

    #[tokio::test]
    async fn service_error_is_surfaced_without_retry() {
        let fake = FakeMailService::default();
        fake.fail_send(MailServiceError::Permanent("Invalid To header".into()));
        let tool = SendEmailTool::new(Arc::new(fake.clone()));

        let result = tool.send("not-an-address", "S", "B").await;

        assert!(matches!(result, Err(SendEmailError::Mail(MailServiceError::Permanent(_)))));
        assert_eq!(fake.send_calls(), 1);
    }

    #[tokio::test]
    async fn injected_headers_never_reach_the_service() {
        let fake = FakeMailService::default();
        let tool = SendEmailTool::new(Arc::new(fake.clone()));

        let result = tool
            .call(SendEmailArgs {
                to: "x@y.com\nBcc: z@w.com".into(),
                subject: "S".into(),
                body: "B".into(),
            })
            .await;

        assert!(matches!(result, Err(SendEmailError::Invalid(_))));
        assert_eq!(fake.send_calls(), 0);
    }
}
