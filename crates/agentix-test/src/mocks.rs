//! Mock implementations of the trait seams the agent loop talks to.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use agentix_approval::{ApprovalDecision, ApprovalGate};
use agentix_llm::{Backend, BackendError, BackendResult, Chunk, StreamBox};
use agentix_types::{Message, Usage};

/// One scripted outcome for a `Backend::stream` call.
#[derive(Debug, Clone)]
pub enum ScriptedStream {
    /// Yield these chunks in order, then end the stream.
    Chunks(Vec<Chunk>),
    /// Fail the call outright with this error.
    Error(BackendError),
}

/// Mock implementation of [`Backend`] for testing the agent loop
/// without a real provider.
///
/// Uses `std::sync::Mutex` internally so builder methods work without
/// requiring a tokio runtime, matching the queue-and-default shape a
/// scripted test double for a streaming frontend would use.
#[derive(Clone)]
pub struct MockBackend {
    name: String,
    model: String,
    max_context_tokens: u64,
    stream_queue: Arc<Mutex<VecDeque<ScriptedStream>>>,
    complete_queue: Arc<Mutex<VecDeque<BackendResult<(Message, Usage)>>>>,
    default_stream: ScriptedStream,
    captured_requests: Arc<Mutex<Vec<Vec<Message>>>>,
}

impl MockBackend {
    /// A mock that, absent any queued response, ends every turn
    /// immediately with an empty assistant message and no tool calls.
    #[must_use]
    pub fn new() -> Self {
        Self {
            name: "mock".to_string(),
            model: "mock-model".to_string(),
            max_context_tokens: 128_000,
            stream_queue: Arc::new(Mutex::new(VecDeque::new())),
            complete_queue: Arc::new(Mutex::new(VecDeque::new())),
            default_stream: ScriptedStream::Chunks(vec![Chunk { message_delta: Message::assistant(""), usage: Some(Usage::default()) }]),
            captured_requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Queue a streaming response that yields `chunks` then ends.
    #[must_use]
    pub fn with_stream_response(self, chunks: Vec<Chunk>) -> Self {
        if let Ok(mut queue) = self.stream_queue.lock() {
            queue.push_back(ScriptedStream::Chunks(chunks));
        }
        self
    }

    /// Queue a streaming response that fails with `error`.
    #[must_use]
    pub fn with_stream_error(self, error: BackendError) -> Self {
        if let Ok(mut queue) = self.stream_queue.lock() {
            queue.push_back(ScriptedStream::Error(error));
        }
        self
    }

    /// Queue a response for the next `complete` call.
    #[must_use]
    pub fn with_complete_response(self, message: Message, usage: Usage) -> Self {
        if let Ok(mut queue) = self.complete_queue.lock() {
            queue.push_back(Ok((message, usage)));
        }
        self
    }

    /// Override the context window reported by `max_context_tokens`.
    #[must_use]
    pub fn with_max_context_tokens(mut self, max_context_tokens: u64) -> Self {
        self.max_context_tokens = max_context_tokens;
        self
    }

    /// Every message list this mock was asked to stream or complete,
    /// in call order — lets a test assert on what the loop actually sent.
    #[must_use]
    pub fn captured_requests(&self) -> Vec<Vec<Message>> {
        self.captured_requests.lock().map(|g| g.clone()).unwrap_or_default()
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Backend for MockBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn max_context_tokens(&self) -> u64 {
        self.max_context_tokens
    }

    async fn stream(
        &self,
        _system: &str,
        messages: &[Message],
        _tools: &[Value],
        _session_affinity: Option<&str>,
    ) -> BackendResult<StreamBox> {
        if let Ok(mut captured) = self.captured_requests.lock() {
            captured.push(messages.to_vec());
        }
        let scripted = self
            .stream_queue
            .lock()
            .ok()
            .and_then(|mut q| q.pop_front())
            .unwrap_or_else(|| self.default_stream.clone());
        match scripted {
            ScriptedStream::Error(err) => Err(err),
            ScriptedStream::Chunks(chunks) => Ok(Box::pin(futures::stream::iter(chunks.into_iter().map(Ok)))),
        }
    }

    async fn complete(&self, _system: &str, messages: &[Message], _tools: &[Value]) -> BackendResult<(Message, Usage)> {
        if let Ok(mut captured) = self.captured_requests.lock() {
            captured.push(messages.to_vec());
        }
        self.complete_queue
            .lock()
            .ok()
            .and_then(|mut q| q.pop_front())
            .unwrap_or_else(|| Ok((Message::assistant("summary"), Usage::default())))
    }
}

/// Mock implementation of [`ApprovalGate`] driven by a scripted queue
/// of decisions, falling back to a configurable default once drained.
pub struct MockApprovalGate {
    decisions: Mutex<VecDeque<ApprovalDecision>>,
    default_decision: ApprovalDecision,
    asked: Mutex<Vec<String>>,
}

impl MockApprovalGate {
    /// A gate that allows once by default once its queue is drained.
    #[must_use]
    pub fn new() -> Self {
        Self {
            decisions: Mutex::new(VecDeque::new()),
            default_decision: ApprovalDecision::AllowOnce,
            asked: Mutex::new(Vec::new()),
        }
    }

    /// Queue a decision to return on the next `ask`.
    #[must_use]
    pub fn with_decision(self, decision: ApprovalDecision) -> Self {
        if let Ok(mut queue) = self.decisions.lock() {
            queue.push_back(decision);
        }
        self
    }

    /// Override the decision returned once the queue is empty.
    #[must_use]
    pub fn with_default(mut self, decision: ApprovalDecision) -> Self {
        self.default_decision = decision;
        self
    }

    /// Tool names this gate was asked about, in order.
    #[must_use]
    pub fn asked_tools(&self) -> Vec<String> {
        self.asked.lock().map(|g| g.clone()).unwrap_or_default()
    }
}

impl Default for MockApprovalGate {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ApprovalGate for MockApprovalGate {
    async fn ask(&self, tool_name: &str, _args: &Value, _tool_call_id: &str) -> (ApprovalDecision, Option<String>) {
        if let Ok(mut asked) = self.asked.lock() {
            asked.push(tool_name.to_string());
        }
        let decision = self
            .decisions
            .lock()
            .ok()
            .and_then(|mut q| q.pop_front())
            .unwrap_or_else(|| self.default_decision.clone());
        (decision, None)
    }
}

/// A host `ask_user_question` callback that always returns a fixed answer.
#[must_use]
pub fn fixed_answer_callback(answer: impl Into<String>) -> agentix_tools::AskUserCallback {
    let answer = answer.into();
    Arc::new(move |_question: String, _suggestions: Vec<String>| {
        let answer = answer.clone();
        Box::pin(async move { answer }) as Pin<Box<dyn Future<Output = String> + Send>>
    })
}
