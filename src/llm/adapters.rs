use crate::llm::core::{LLM, LLMError};
use async_trait::async_trait;
use rig::{agent::Agent as RigAgent, completion::CompletionModel};
use tracing::debug;

/// Implementation of the `LLM` trait for `rig::Agent`.
///
/// Each call is a single, stateless completion: the agent loop renders the
/// whole transcript into the prompt, so no chat history lives inside rig.
///
/// ```rust,ignore
/// use forgemail::llm::LLM;
/// use rig::{client::CompletionClient, providers::gemini};
///
/// let agent = gemini::Client::new(&api_key)
///     .agent("gemini-2.0-flash-lite")
///     .preamble("You are a helpful assistant")
///     .build();
/// let mut llm: Box<dyn LLM> = Box::new(agent);
/// ```
#[async_trait]
impl<M> LLM for RigAgent<M>
where
    M: CompletionModel,
{
    async fn prompt(&mut self, text: String) -> Result<String, LLMError> {
        rig::completion::Prompt::prompt(self, text)
            .await
            .map(|response| response.to_string())
            .map_err(|e| {
                debug!("Rig agent error: {}", e);
                LLMError::PromptError(e.to_string())
            })
    }
}
