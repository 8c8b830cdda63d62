//! Validation and dispatch of model tool requests.
//!
//! The model names a tool and passes JSON arguments. [`ToolCall::parse`]
//! turns that pair into one variant of a closed enum, so an unknown tool or a
//! malformed argument object is rejected before anything touches the mailbox.

use super::send_email::{SendEmailArgs, SendEmailError, SendEmailTool};
use super::summarize::{BatchSummarizer, ReadEmailsArgs, SummarizeError};
use crate::llm::LLM;
use crate::mail::MailService;
use rig::{completion::ToolDefinition, tool::Tool};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaValidationError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
    #[error("Invalid arguments for {tool}: {reason}")]
    InvalidArguments { tool: &'static str, reason: String },
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error(transparent)]
    Schema(#[from] SchemaValidationError),
    #[error(transparent)]
    Summarize(#[from] SummarizeError),
    #[error(transparent)]
    Send(#[from] SendEmailError),
}

/// A validated tool request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolCall {
    ReadAndSummarizeEmails(ReadEmailsArgs),
    SendEmail(SendEmailArgs),
}

impl ToolCall {
    /// Validates `arguments` against the schema of the tool called `name`.
    ///
    /// Arguments may also arrive as a JSON-encoded string, which some models
    /// produce. `null` is read as an empty object.
    pub fn parse(name: &str, arguments: Value) -> Result<Self, SchemaValidationError> {
        match name {
            name if name == BatchSummarizer::NAME => {
                parse_args(BatchSummarizer::NAME, arguments).map(Self::ReadAndSummarizeEmails)
            }
            name if name == SendEmailTool::NAME => {
                parse_args(SendEmailTool::NAME, arguments).map(Self::SendEmail)
            }
            other => Err(SchemaValidationError::UnknownTool(other.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::ReadAndSummarizeEmails(_) => BatchSummarizer::NAME,
            Self::SendEmail(_) => SendEmailTool::NAME,
        }
    }
}

fn parse_args<T: DeserializeOwned>(
    tool: &'static str,
    arguments: Value,
) -> Result<T, SchemaValidationError> {
    let invalid = |reason: String| SchemaValidationError::InvalidArguments { tool, reason };
    let arguments = match arguments {
        Value::String(encoded) => {
            serde_json::from_str(&encoded).map_err(|e| invalid(e.to_string()))?
        }
        Value::Null => Value::Object(Default::default()),
        other => other,
    };
    if !arguments.is_object() {
        return Err(invalid("expected a JSON object".to_string()));
    }
    serde_json::from_value(arguments).map_err(|e| invalid(e.to_string()))
}

/// The tools available to the agent.
pub struct ToolRegistry {
    summarizer: BatchSummarizer,
    sender: SendEmailTool,
}

impl ToolRegistry {
    pub fn new(summarizer: BatchSummarizer, sender: SendEmailTool) -> Self {
        Self { summarizer, sender }
    }

    /// Both tools over one mailbox. `summary_model` is used only for
    /// summarization.
    pub fn for_mailbox(mail: Arc<dyn MailService>, summary_model: Box<dyn LLM>) -> Self {
        Self::new(
            BatchSummarizer::new(mail.clone(), summary_model),
            SendEmailTool::new(mail),
        )
    }

    pub async fn definitions(&self) -> Vec<ToolDefinition> {
        vec![
            self.summarizer.definition(String::new()).await,
            self.sender.definition(String::new()).await,
        ]
    }

    pub async fn execute(&self, call: ToolCall) -> Result<String, ToolError> {
        debug!(tool = call.name(), "Executing tool");
        match call {
            ToolCall::ReadAndSummarizeEmails(args) => Ok(self.summarizer.call(args).await?),
            ToolCall::SendEmail(args) => Ok(self.sender.call(args).await?),
        }
    }

    /// Validates then executes a raw request from the model.
    pub async fn invoke(&self, name: &str, arguments: Value) -> Result<String, ToolError> {
        let call = ToolCall::parse(name, arguments)?;
        self.execute(call).await
    }
}
