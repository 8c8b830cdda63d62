// The `providers` module builds rig agents for the configured model vendor.

use crate::config::{ModelConfig, ModelProvider};
use crate::llm::core::LLM;
use rig::client::CompletionClient;
use rig::providers::{gemini, openai};
use tracing::info;

/// Builds a stateless rig agent with the given preamble for the configured
/// provider.
pub fn build_model(config: &ModelConfig, preamble: &str) -> Box<dyn LLM> {
    info!(provider = ?config.provider, model = %config.model, "Building model client");
    match config.provider {
        ModelProvider::Gemini => {
            let agent = gemini::Client::new(&config.api_key)
                .agent(&config.model)
                .preamble(preamble)
                .temperature(config.temperature)
                .max_tokens(config.max_tokens)
                .build();
            Box::new(agent)
        }
        ModelProvider::OpenAI => {
            let agent = openai::Client::new(&config.api_key)
                .agent(&config.model)
                .preamble(preamble)
                .temperature(config.temperature)
                .max_tokens(config.max_tokens)
                .build();
            Box::new(agent)
        }
    }
}
