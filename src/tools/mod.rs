// Tools the agent can call.
pub mod registry;
pub mod send_email;
pub mod summarize;

pub use registry::{SchemaValidationError, ToolCall, ToolError, ToolRegistry};
pub use send_email::{SEND_SUCCESS, SendEmailArgs, SendEmailError, SendEmailTool};
pub use summarize::{BatchSummarizer, MAX_MESSAGES, NO_EMAILS_FOUND, ReadEmailsArgs, SummarizeError};
