// Fakes shared by the unit tests.

use crate::llm::{LLM, LLMError};
use crate::mail::decoder::encode_body;
use crate::mail::{MailService, MailServiceError, MessagePart, PLAIN_TEXT_MIME, Query};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct MailState {
    messages: Vec<(String, MessagePart)>,
    ignore_max_results: bool,
    list_failures: usize,
    failing_gets: Vec<String>,
    send_failure: Option<MailServiceError>,
    queries: Vec<(String, u32)>,
    list_calls: usize,
    get_calls: usize,
    send_calls: usize,
    sent: Vec<String>,
}

/// In-memory mailbox that records every call.
#[derive(Clone, Default)]
pub struct FakeMailService {
    state: Arc<Mutex<MailState>>,
}

impl FakeMailService {
    /// Messages `m1..mN`, each a single `text/plain` part with the given text.
    pub fn with_plain_messages(texts: &[&str]) -> Self {
        Self::with_payloads(
            texts
                .iter()
                .map(|text| {
                    MessagePart::leaf(PLAIN_TEXT_MIME, Some(encode_body(text.as_bytes())))
                })
                .collect(),
        )
    }

    /// Messages `m1..mN` with arbitrary payloads.
    pub fn with_payloads(payloads: Vec<MessagePart>) -> Self {
        let fake = Self::default();
        fake.lock().messages = payloads
            .into_iter()
            .enumerate()
            .map(|(i, payload)| (format!("m{}", i + 1), payload))
            .collect();
        fake
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MailState> {
        self.state.lock().unwrap()
    }

    /// Return every message from `list_messages`, like a service that
    /// ignores the page size.
    pub fn ignore_max_results(&self) {
        self.lock().ignore_max_results = true;
    }

    pub fn fail_list_transiently(&self, times: usize) {
        self.lock().list_failures = times;
    }

    pub fn fail_get(&self, id: &str) {
        self.lock().failing_gets.push(id.to_string());
    }

    pub fn fail_send(&self, error: MailServiceError) {
        self.lock().send_failure = Some(error);
    }

    pub fn queries(&self) -> Vec<(String, u32)> {
        self.lock().queries.clone()
    }

    pub fn list_calls(&self) -> usize {
        self.lock().list_calls
    }

    pub fn get_calls(&self) -> usize {
        self.lock().get_calls
    }

    pub fn send_calls(&self) -> usize {
        self.lock().send_calls
    }

    /// Raw payloads of the successful sends.
    pub fn sent(&self) -> Vec<String> {
        self.lock().sent.clone()
    }
}

#[async_trait]
impl MailService for FakeMailService {
    async fn list_messages(
        &self,
        query: &Query,
        max_results: u32,
    ) -> Result<Vec<String>, MailServiceError> {
        let mut state = self.lock();
        state.list_calls += 1;
        state.queries.push((query.to_string(), max_results));
        if state.list_failures > 0 {
            state.list_failures -= 1;
            return Err(MailServiceError::Transient("503 backend error".to_string()));
        }
        let limit = if state.ignore_max_results {
            usize::MAX
        } else {
            max_results as usize
        };
        Ok(state
            .messages
            .iter()
            .take(limit)
            .map(|(id, _)| id.clone())
            .collect())
    }

    async fn get_message(&self, id: &str) -> Result<MessagePart, MailServiceError> {
        let mut state = self.lock();
        state.get_calls += 1;
        if state.failing_gets.iter().any(|failing| failing == id) {
            return Err(MailServiceError::Permanent(format!("cannot fetch {id}")));
        }
        state
            .messages
            .iter()
            .find(|(message_id, _)| message_id == id)
            .map(|(_, payload)| payload.clone())
            .ok_or_else(|| MailServiceError::Permanent(format!("404 message {id} not found")))
    }

    async fn send_message(&self, raw: &str) -> Result<(), MailServiceError> {
        let mut state = self.lock();
        state.send_calls += 1;
        if let Some(error) = state.send_failure.take() {
            return Err(error);
        }
        state.sent.push(raw.to_string());
        Ok(())
    }
}

/// A model that replays canned responses and records every prompt.
#[derive(Clone, Default)]
pub struct ScriptedLLM {
    responses: Arc<Mutex<VecDeque<Result<String, String>>>>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl ScriptedLLM {
    pub fn new(responses: &[&str]) -> Self {
        let llm = Self::default();
        for response in responses {
            llm.push_ok(response);
        }
        llm
    }

    pub fn push_ok(&self, response: &str) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Ok(response.to_string()));
    }

    pub fn push_err(&self, message: &str) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Err(message.to_string()));
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl LLM for ScriptedLLM {
    async fn prompt(&mut self, text: String) -> Result<String, LLMError> {
        self.prompts.lock().unwrap().push(text);
        match self.responses.lock().unwrap().pop_front() {
            Some(Ok(response)) => Ok(response),
            Some(Err(message)) => Err(LLMError::PromptError(message)),
            None => Err(LLMError::PromptError("script exhausted".to_string())),
        }
    }
}

/// A model that never answers.
pub struct HangingLLM;

#[async_trait]
impl LLM for HangingLLM {
    async fn prompt(&mut self, _text: String) -> Result<String, LLMError> {
        std::future::pending().await
    }
}
