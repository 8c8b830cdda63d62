use crate::llm::{LLM, LLMError};
use crate::mail::{MailService, MailServiceError, Query, decode};
use crate::utils::{DateParseError, parse_natural_date};
use chrono::{Local, NaiveDate};
use rig::{completion::ToolDefinition, tool::Tool};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Upper bound on the number of messages read per summary.
pub const MAX_MESSAGES: usize = 12;

/// Returned when the query matches nothing. No model call is made.
pub const NO_EMAILS_FOUND: &str = "No emails found for that date.";

const SUMMARY_INSTRUCTION: &str = "Summarize these emails clearly:";

#[derive(Debug, Error)]
pub enum SummarizeError {
    #[error("Could not understand the date: {0}")]
    Date(#[from] DateParseError),
    #[error("Mail service error: {0}")]
    Mail(#[from] MailServiceError),
    #[error("Summarization failed: {0}")]
    Model(#[from] LLMError),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReadEmailsArgs {
    /// Free-form date, e.g. "Feb 11th 2026" or "yesterday".
    pub date: String,
    #[serde(default)]
    pub sender: Option<String>,
}

/// Reads one day of mail and asks the model for a summary.
pub struct BatchSummarizer {
    mail: Arc<dyn MailService>,
    model: Mutex<Box<dyn LLM>>,
}

impl BatchSummarizer {
    pub fn new(mail: Arc<dyn MailService>, model: Box<dyn LLM>) -> Self {
        Self {
            mail,
            model: Mutex::new(model),
        }
    }

    /// Summarizes the messages received on `date`, relative to the local
    /// calendar day.
    pub async fn summarize(&self, date: &str, sender: Option<&str>) -> Result<String, SummarizeError> {
        self.summarize_on(date, sender, Local::now().date_naive()).await
    }

    pub async fn summarize_on(
        &self,
        date: &str,
        sender: Option<&str>,
        today: NaiveDate,
    ) -> Result<String, SummarizeError> {
        let day = parse_natural_date(date, today)?;
        let query = Query::for_day(day, sender);
        info!(query = %query, "Reading emails");

        let mut ids = self.mail.list_messages(&query, MAX_MESSAGES as u32).await?;
        ids.truncate(MAX_MESSAGES);
        if ids.is_empty() {
            info!(query = %query, "No emails matched");
            return Ok(NO_EMAILS_FOUND.to_string());
        }

        let mut text = String::new();
        for id in &ids {
            let payload = match self.mail.get_message(id).await {
                Ok(payload) => payload,
                Err(e) => {
                    warn!(message_id = %id, error = %e, "Skipping message that could not be fetched");
                    continue;
                }
            };
            match decode(&payload) {
                Ok(decoded) if decoded.is_empty() => {
                    warn!(message_id = %id, "Message has no plain-text part");
                }
                Ok(decoded) => {
                    debug!(message_id = %id, chars = decoded.chars().count(), "Decoded message");
                    text.push_str(&decoded);
                }
                Err(e) => {
                    warn!(message_id = %id, error = %e, "Skipping message that could not be decoded");
                }
            }
        }

        let prompt = format!("{SUMMARY_INSTRUCTION}\n\n{text}");
        let summary = self.model.lock().await.prompt(prompt).await?;
        info!(messages = ids.len(), "Summary ready");
        Ok(summary)
    }
}

impl Tool for BatchSummarizer {
    const NAME: &'static str = "ReadAndSummarizeEmails";

    type Args = ReadEmailsArgs;
    type Error = SummarizeError;
    type Output = String;

    async fn definition(&self, _prompt: String) -> ToolDefinition {
        ToolDefinition {
            name: Self::NAME.to_string(),
            description: "Reads emails from a specific date and summarizes them".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "date": {
                        "type": "string",
                        "description": "The day to read, e.g. \"2026-02-11\", \"Feb 11th 2026\" or \"yesterday\"."
                    },
                    "sender": {
                        "type": "string",
                        "description": "Only read emails from this address."
                    }
                },
                "required": ["date"]
            }),
        }
    }

    async fn call(&self, args: Self::Args) -> Result<Self::Output, Self::Error> {
        self.summarize(&args.date, args.sender.as_deref()).await
    }
}
