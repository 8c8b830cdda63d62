//! The planner loop.
//!
//! Each round renders the whole transcript (system prompt, the user's
//! instruction, every earlier tool request and its observation) and asks the
//! model for its next move. The model either requests a tool or gives the
//! final answer, as a small JSON object:
//!
//! ```text
//! {"action":"tool","tool":"SendEmail","arguments":{"to":"x@y.com","subject":"S","body":"B"}}
//! {"action":"final","answer":"Your email has been sent."}
//! ```
//!
//! Tools run one at a time. A failing tool never ends the run: its error text
//! becomes the observation the model sees next. So does a reply that looks
//! like a protocol object but does not fit either shape.

use crate::config::DEFAULT_MAX_STEPS;
use crate::llm::{LLM, LLMError};
use crate::shutdown::Shutdown;
use crate::tools::ToolRegistry;
use crate::utils::{TEngine, TEngineError};
use chrono::{Local, NaiveDate};
use prompt_crafter::{
    Context, Example, FewShot, Instruction, OutputFormat, Persona, Prompt, ToolCatalog, ToolSpec,
};
use rig::completion::ToolDefinition;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::fmt;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

const TRANSCRIPT_TEMPLATE_NAME: &str = "transcript";

/// Source named in observations about replies that broke the protocol.
const PROTOCOL_SOURCE: &str = "protocol";

const TRANSCRIPT_TEMPLATE: &str = "{{system}}

### Conversation ###
User: {{instruction}}
{{#each turns}}
Assistant: {{verbatim this.request}}
Observation from {{this.tool}}{{#if this.is_error}} (error){{/if}}: {{this.content}}
{{/each}}
Assistant:";

pub const PERSONA: &str = "You are a helpful assistant that can read and send emails.";

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("No final answer after {0} model steps")]
    StepLimitExceeded(usize),
    #[error("Planner model error: {0}")]
    Model(#[from] LLMError),
    #[error("Run cancelled")]
    Cancelled,
    #[error("Handlebars template error: {0}")]
    TemplateError(#[from] TEngineError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    AwaitingModel,
    ExecutingTool,
    Done,
}

/// Progress reported while a run is under way.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AgentStep {
    ModelReply {
        step: usize,
        text: String,
    },
    ToolRequested {
        id: String,
        tool: String,
        arguments: Value,
    },
    Observation {
        id: String,
        tool: String,
        content: String,
        is_error: bool,
    },
    FinalAnswer {
        text: String,
    },
}

impl fmt::Display for AgentStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ModelReply { step, text } => write!(f, "[step {step}] model: {text}"),
            Self::ToolRequested {
                tool, arguments, ..
            } => write!(f, "-> {tool} {arguments}"),
            Self::Observation {
                tool,
                content,
                is_error: false,
                ..
            } => write!(f, "<- {tool}: {content}"),
            Self::Observation { tool, content, .. } => write!(f, "<- {tool} failed: {content}"),
            Self::FinalAnswer { text } => write!(f, "Answer: {text}"),
        }
    }
}

/// What the model asked for.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelAction {
    Tool { name: String, arguments: Value },
    Final(String),
    /// A JSON object carrying an `action` key that is not a valid request.
    Invalid { request: Value, reason: String },
}

#[derive(Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
enum Reply {
    Tool {
        tool: String,
        #[serde(default)]
        arguments: Value,
    },
    Final {
        answer: String,
    },
}

impl Reply {
    fn into_action(self) -> ModelAction {
        match self {
            Self::Tool { tool, arguments } => ModelAction::Tool {
                name: tool,
                arguments,
            },
            Self::Final { answer } => ModelAction::Final(answer),
        }
    }
}

/// Reads a model reply.
///
/// A protocol object may be fenced or wrapped in prose. Text with no JSON
/// object carrying an `action` key is taken as the final answer; such an
/// object that does not deserialize, or more than one of them, is
/// [`ModelAction::Invalid`].
pub fn parse_reply(text: &str) -> ModelAction {
    let trimmed = text.trim();
    let candidate = strip_code_fence(trimmed);
    if let Ok(reply) = serde_json::from_str::<Reply>(candidate) {
        return reply.into_action();
    }

    let mut objects = protocol_objects(candidate);
    match objects.len() {
        0 => ModelAction::Final(trimmed.to_string()),
        1 => {
            let request = objects.remove(0);
            match serde_json::from_value::<Reply>(request.clone()) {
                Ok(reply) => reply.into_action(),
                Err(e) => ModelAction::Invalid {
                    request,
                    reason: e.to_string(),
                },
            }
        }
        n => ModelAction::Invalid {
            request: Value::Array(objects),
            reason: format!("expected one JSON object per reply, got {n}"),
        },
    }
}

/// JSON objects with an `action` key found in `text`, starting at its first
/// `{`. Concatenated objects are all returned.
fn protocol_objects(text: &str) -> Vec<Value> {
    let Some(start) = text.find('{') else {
        return Vec::new();
    };
    serde_json::Deserializer::from_str(&text[start..])
        .into_iter::<Value>()
        .map_while(Result::ok)
        .filter(|value| value.get("action").is_some())
        .collect()
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    match rest.split_once('\n') {
        // Language tag, e.g. ```json
        Some((tag, body)) if !tag.trim_start().starts_with('{') => body.trim(),
        _ => rest.trim(),
    }
}

/// The default planner instructions.
pub fn system_prompt(today: NaiveDate, tools: &[ToolDefinition]) -> String {
    let catalog = tools
        .iter()
        .map(|tool| ToolSpec {
            name: tool.name.clone(),
            description: tool.description.clone(),
            parameters: tool.parameters.to_string(),
        })
        .collect();

    Prompt::builder()
        .add(Persona::new(PERSONA))
        .add(Context::new(format!(
            "Today is {} ({}).",
            today.format("%Y-%m-%d"),
            today.format("%A")
        )))
        .add(ToolCatalog::new(catalog))
        .add(Instruction::new(
            "Work out what the user wants. Call at most one tool per reply and wait for its \
             observation before deciding the next step. When you have what you need, give \
             the final answer.",
        ))
        .add(OutputFormat::new(
            "A single JSON object and nothing else. Either\n\
             {\"action\":\"tool\",\"tool\":\"<tool name>\",\"arguments\":{...}}\n\
             or\n\
             {\"action\":\"final\",\"answer\":\"<your answer to the user>\"}",
        ))
        .add(FewShot::new(vec![
            Example::new(
                "Summarize my emails from Feb 11th 2026",
                r#"{"action":"tool","tool":"ReadAndSummarizeEmails","arguments":{"date":"Feb 11th 2026"}}"#,
            ),
            Example::new(
                "Send x@y.com an email with subject S saying B",
                r#"{"action":"tool","tool":"SendEmail","arguments":{"to":"x@y.com","subject":"S","body":"B"}}"#,
            ),
        ]))
        .build()
        .to_string()
}

#[derive(Serialize)]
struct Turn {
    request: Value,
    tool: String,
    content: String,
    is_error: bool,
}

#[derive(Serialize)]
struct Transcript<'a> {
    system: &'a str,
    instruction: &'a str,
    turns: &'a [Turn],
}

pub struct AgentBuilder {
    model: Box<dyn LLM>,
    registry: ToolRegistry,
    system_prompt: Option<String>,
    max_steps: usize,
    shutdown_handler: Option<Box<dyn Shutdown>>,
    step_sink: Option<mpsc::Sender<AgentStep>>,
}

impl AgentBuilder {
    /// `model` plans; the registry's tools carry their own models.
    pub fn new(model: Box<dyn LLM>, registry: ToolRegistry) -> Self {
        Self {
            model,
            registry,
            system_prompt: None,
            max_steps: DEFAULT_MAX_STEPS,
            shutdown_handler: None,
            step_sink: None,
        }
    }

    /// Upper bound on model round-trips per run. Zero is raised to one.
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps.max(1);
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_shutdown_handler(mut self, handler: impl Shutdown + 'static) -> Self {
        self.shutdown_handler = Some(Box::new(handler));
        self
    }

    /// Every step is sent here as soon as it completes.
    pub fn with_step_sink(mut self, sink: mpsc::Sender<AgentStep>) -> Self {
        self.step_sink = Some(sink);
        self
    }

    pub async fn build(self) -> Result<Agent, AgentError> {
        let system_prompt = match self.system_prompt {
            Some(prompt) => prompt,
            None => {
                let definitions = self.registry.definitions().await;
                system_prompt(Local::now().date_naive(), &definitions)
            }
        };
        let mut handlebars = TEngine::new();
        handlebars.register_template_string(TRANSCRIPT_TEMPLATE_NAME, TRANSCRIPT_TEMPLATE)?;

        Ok(Agent {
            model: self.model,
            registry: self.registry,
            system_prompt,
            max_steps: self.max_steps,
            shutdown_handler: self.shutdown_handler,
            step_sink: self.step_sink,
            handlebars,
            state: AgentState::Done,
        })
    }
}

pub struct Agent {
    model: Box<dyn LLM>,
    registry: ToolRegistry,
    system_prompt: String,
    max_steps: usize,
    shutdown_handler: Option<Box<dyn Shutdown>>,
    step_sink: Option<mpsc::Sender<AgentStep>>,
    handlebars: TEngine,
    state: AgentState,
}

impl Agent {
    pub fn builder(model: Box<dyn LLM>, registry: ToolRegistry) -> AgentBuilder {
        AgentBuilder::new(model, registry)
    }

    pub fn state(&self) -> AgentState {
        self.state
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Runs `instruction` to a final answer.
    ///
    /// If a shutdown handler is set and fires first, the in-flight model or
    /// tool call is dropped and [`AgentError::Cancelled`] is returned.
    pub async fn run(&mut self, instruction: &str) -> Result<String, AgentError> {
        info!(max_steps = self.max_steps, "Agent run started");
        let result = match self.shutdown_handler.take() {
            Some(mut handler) => {
                let result = tokio::select! {
                    result = self.run_loop(instruction) => result,
                    _ = handler.wait_for_signal() => {
                        warn!("Shutdown signal received, abandoning the run");
                        Err(AgentError::Cancelled)
                    }
                };
                self.shutdown_handler = Some(handler);
                result
            }
            None => self.run_loop(instruction).await,
        };
        self.state = AgentState::Done;

        match &result {
            Ok(_) => info!("Agent run finished"),
            Err(e) => warn!(error = %e, "Agent run ended without an answer"),
        }
        result
    }

    async fn run_loop(&mut self, instruction: &str) -> Result<String, AgentError> {
        let mut turns: Vec<Turn> = Vec::new();

        for step in 1..=self.max_steps {
            self.state = AgentState::AwaitingModel;
            let transcript = self.handlebars.render(
                TRANSCRIPT_TEMPLATE_NAME,
                &Transcript {
                    system: &self.system_prompt,
                    instruction,
                    turns: &turns,
                },
            )?;
            debug!(step, chars = transcript.len(), "Prompting planner");
            let reply = self.model.prompt(transcript).await?;
            self.emit(AgentStep::ModelReply {
                step,
                text: reply.clone(),
            })
            .await;

            let (name, arguments) = match parse_reply(&reply) {
                ModelAction::Final(answer) => {
                    self.state = AgentState::Done;
                    self.emit(AgentStep::FinalAnswer {
                        text: answer.clone(),
                    })
                    .await;
                    return Ok(answer);
                }
                ModelAction::Tool { name, arguments } => (name, arguments),
                ModelAction::Invalid { request, reason } => {
                    warn!(step, reason = %reason, "Planner reply broke the protocol");
                    let content = format!(
                        "Invalid tool request: {reason}. Reply with exactly one object, either \
                         {{\"action\":\"tool\",\"tool\":\"<tool name>\",\"arguments\":{{...}}}} or \
                         {{\"action\":\"final\",\"answer\":\"...\"}}."
                    );
                    self.emit(AgentStep::Observation {
                        id: Uuid::new_v4().to_string(),
                        tool: PROTOCOL_SOURCE.to_string(),
                        content: content.clone(),
                        is_error: true,
                    })
                    .await;
                    turns.push(Turn {
                        request,
                        tool: PROTOCOL_SOURCE.to_string(),
                        content,
                        is_error: true,
                    });
                    continue;
                }
            };

            self.state = AgentState::ExecutingTool;
            let id = Uuid::new_v4().to_string();
            info!(step, tool = %name, call_id = %id, "Tool requested");
            self.emit(AgentStep::ToolRequested {
                id: id.clone(),
                tool: name.clone(),
                arguments: arguments.clone(),
            })
            .await;

            let (content, is_error) = match self.registry.invoke(&name, arguments.clone()).await {
                Ok(output) => (output, false),
                Err(e) => {
                    warn!(tool = %name, call_id = %id, error = %e, "Tool failed");
                    (e.to_string(), true)
                }
            };
            self.emit(AgentStep::Observation {
                id,
                tool: name.clone(),
                content: content.clone(),
                is_error,
            })
            .await;

            turns.push(Turn {
                request: json!({"action": "tool", "tool": name, "arguments": arguments}),
                tool: name,
                content,
                is_error,
            });
        }

        Err(AgentError::StepLimitExceeded(self.max_steps))
    }

    async fn emit(&self, step: AgentStep) {
        if let Some(sink) = &self.step_sink {
            if sink.send(step).await.is_err() {
                debug!("Step receiver dropped");
            }
        }
    }
}
