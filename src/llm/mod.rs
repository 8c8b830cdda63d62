// The `llm` module provides a trait for interacting with language models.

pub mod adapters;
pub mod core;
pub mod decorators;
pub mod factory;
pub mod providers;

pub use self::core::{LLM, LLMError};
pub use decorators::RetryableLLM;
pub use factory::LLMFactory;
pub use providers::build_model;
