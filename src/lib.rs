//! # forgemail: a Gmail assistant driven by a language model.
//!
//! An [`agent::Agent`] turns a natural-language instruction into calls to two
//! tools, one that reads and summarizes a day of mail and one that sends an
//! email, and reports each step as it happens.

/// The `agent` module runs the planner loop.
pub mod agent;
/// The `config` module reads runtime settings from the environment.
pub mod config;
/// The `llm` module provides a trait for interacting with language models.
pub mod llm;
/// The `mail` module talks to the mailbox and decodes message bodies.
pub mod mail;
/// The `retry` module holds the backoff settings shared by the model and mail clients.
pub mod retry;
/// The `shutdown` module provides a trait for cancelling a run.
pub mod shutdown;
/// The `tools` module provides the tools the agent can call.
pub mod tools;
/// The `utils` module provides authentication, dates and templating.
pub mod utils;

#[cfg(test)]
mod test_support;

pub use agent::{Agent, AgentBuilder, AgentError, AgentStep};
pub use config::AppConfig;
pub use mail::{GmailMailService, MailService, RetryingMailService};
pub use tools::ToolRegistry;
pub use utils::context_hub::ContextHub;
