use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use async_stream::stream;
use futures::{Stream, StreamExt};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use uuid::Uuid;

use agentix_approval::{ApprovalDecision, ApprovalGate, NullApprovalGate};
use agentix_config::RuntimeConfig;
use agentix_llm::{Backend, BackendError};
use agentix_tools::{AskUserCallback, InvokeContext, SubAgentSpawner, ToolFilter, ToolRegistry};
use agentix_types::{Event, Message, StopReason, Usage};

use crate::error::RuntimeError;
use crate::message_store::MessageStore;
use crate::middleware::{AutoCompactMiddleware, MiddlewareAction, MiddlewarePipeline};

/// A boxed stream of loop [`Event`]s.
pub type EventStream = Pin<Box<dyn Stream<Item = Event> + Send>>;

const SUMMARIZE_SYSTEM_PROMPT: &str =
    "Summarize the conversation so far concisely, preserving facts, decisions, and outstanding work, \
     so the assistant can continue without the full transcript.";

/// Wrap a cancellation reason so downstream sanitizers can strip it
/// from displayed tool output.
fn cancelled_content(reason: &str) -> String {
    format!("<cancelled>{reason}</cancelled>")
}

/// Builds an [`AgentLoop`].
pub struct AgentLoopBuilder {
    backend: Option<Arc<dyn Backend>>,
    tools: ToolRegistry,
    approval: Arc<dyn ApprovalGate>,
    config: RuntimeConfig,
    system_prompt: String,
    tool_filter: ToolFilter,
    session_affinity: Option<String>,
    is_plan_agent: bool,
    subagent_spawner: Option<Arc<dyn SubAgentSpawner>>,
    workspace_root: PathBuf,
    ask_user: Option<AskUserCallback>,
    cancel_token: Option<CancellationToken>,
}

impl Default for AgentLoopBuilder {
    fn default() -> Self {
        Self {
            backend: None,
            tools: ToolRegistry::with_builtins(),
            approval: Arc::new(NullApprovalGate),
            config: RuntimeConfig::default(),
            system_prompt: String::new(),
            tool_filter: ToolFilter::allow_all(),
            session_affinity: None,
            is_plan_agent: false,
            subagent_spawner: None,
            workspace_root: PathBuf::from("."),
            ask_user: None,
            cancel_token: None,
        }
    }
}

impl AgentLoopBuilder {
    /// Start a builder with the default tool registry, a no-op
    /// approval gate, and default runtime config.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The backend to drive this loop with. Required.
    #[must_use]
    pub fn backend(mut self, backend: Arc<dyn Backend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Replace the default tool registry.
    #[must_use]
    pub fn tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    /// Replace the default (always-allow) approval gate.
    #[must_use]
    pub fn approval(mut self, approval: Arc<dyn ApprovalGate>) -> Self {
        self.approval = approval;
        self
    }

    /// Effective runtime config (after an [`agentix_config::AgentProfile`]'s
    /// overrides have been applied, if any).
    #[must_use]
    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// System prompt sent with every request.
    #[must_use]
    pub fn system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = system_prompt.into();
        self
    }

    /// Restrict which tools are exposed to the model this loop.
    #[must_use]
    pub fn tool_filter(mut self, tool_filter: ToolFilter) -> Self {
        self.tool_filter = tool_filter;
        self
    }

    /// Sticky-routing hint forwarded to the backend's `stream` calls.
    #[must_use]
    pub fn session_affinity(mut self, session_affinity: impl Into<String>) -> Self {
        self.session_affinity = Some(session_affinity.into());
        self
    }

    /// Whether the plan-agent reminder middleware should be active.
    #[must_use]
    pub fn is_plan_agent(mut self, is_plan_agent: bool) -> Self {
        self.is_plan_agent = is_plan_agent;
        self
    }

    /// Spawner the `task` tool will use to run sub-agents.
    #[must_use]
    pub fn subagent_spawner(mut self, spawner: Arc<dyn SubAgentSpawner>) -> Self {
        self.subagent_spawner = Some(spawner);
        self
    }

    /// Workspace root tools resolve relative paths against.
    #[must_use]
    pub fn workspace_root(mut self, workspace_root: PathBuf) -> Self {
        self.workspace_root = workspace_root;
        self
    }

    /// Host callback for the `ask_user_question` tool.
    #[must_use]
    pub fn ask_user(mut self, callback: AskUserCallback) -> Self {
        self.ask_user = Some(callback);
        self
    }

    /// External cancellation token a host can trigger to stop this
    /// loop at its next checkpoint. Defaults to a fresh, loop-owned
    /// token if not supplied.
    #[must_use]
    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel_token = Some(token);
        self
    }

    /// Build the loop, or fail if a required field is missing.
    pub fn build(self) -> Result<AgentLoop, RuntimeError> {
        let backend = self
            .backend
            .ok_or_else(|| RuntimeError::InvalidConfiguration("no backend configured".to_string()))?;

        let mut invoke_ctx = InvokeContext::new(self.workspace_root);
        if let Some(ask_user) = self.ask_user {
            invoke_ctx = invoke_ctx.with_ask_user(ask_user);
        }
        if let Some(token) = self.cancel_token {
            invoke_ctx = invoke_ctx.with_cancel_token(token);
        }
        let invoke_ctx = Arc::new(invoke_ctx);

        Ok(AgentLoop {
            backend,
            tools: self.tools,
            approval: self.approval,
            config: self.config,
            system_prompt: self.system_prompt,
            tool_filter: self.tool_filter,
            session_affinity: self.session_affinity,
            pipeline: MiddlewarePipeline::with_required(self.is_plan_agent),
            store: MessageStore::new(),
            invoke_ctx,
            subagent_spawner: self.subagent_spawner,
        })
    }
}

/// Drives one conversation: a backend, a tool registry, an approval
/// gate, and the middleware pipeline, turning user messages into a
/// stream of [`Event`]s.
///
/// `run` consumes the loop by value. A fresh `AgentLoop` is built (with
/// [`AgentLoopBuilder`]) for each conversation; sub-agents build their
/// own short-lived loop rather than sharing one.
pub struct AgentLoop {
    backend: Arc<dyn Backend>,
    tools: ToolRegistry,
    approval: Arc<dyn ApprovalGate>,
    config: RuntimeConfig,
    system_prompt: String,
    tool_filter: ToolFilter,
    session_affinity: Option<String>,
    pipeline: MiddlewarePipeline,
    store: MessageStore,
    invoke_ctx: Arc<InvokeContext>,
    subagent_spawner: Option<Arc<dyn SubAgentSpawner>>,
}

fn available_tool_definitions(tools: &ToolRegistry, filter: &ToolFilter) -> Vec<Value> {
    tools
        .all_definitions()
        .into_iter()
        .filter(|def| def["function"]["name"].as_str().is_some_and(|name| filter.allows(name)))
        .collect()
}

impl AgentLoop {
    /// Start a builder.
    #[must_use]
    pub fn builder() -> AgentLoopBuilder {
        AgentLoopBuilder::new()
    }

    /// The cancellation token a host can trigger to stop this loop at
    /// its next checkpoint (before a backend call, between tool
    /// calls, or mid-tool for tools that observe it themselves).
    /// Clone this before calling [`Self::run`] — `run` consumes the
    /// loop by value.
    #[must_use]
    pub fn cancel_token(&self) -> CancellationToken {
        self.invoke_ctx.cancel_token.clone()
    }

    /// Run the loop to completion against one user message, yielding
    /// every [`Event`] as it happens.
    ///
    /// Implements the turn cycle: pre-turn middleware, a streamed
    /// backend request, sequential tool dispatch in call order, then
    /// post-turn middleware — looping back to the top whenever tools
    /// ran, and stopping once the assistant produces a final answer
    /// with no pending calls, a middleware asks to stop or inject a
    /// closing notice, an external cancellation is observed, or an
    /// unrecoverable error occurs.
    #[must_use]
    pub fn run(mut self, user_message: String) -> EventStream {
        Box::pin(stream! {
            self.store.push(Message::user(user_message.clone()));
            yield Event::UserMessage { message: user_message };

            if let Some(spawner) = self.subagent_spawner.clone() {
                self.invoke_ctx.set_subagent_spawner(Some(spawner)).await;
            }

            let mut total_usage = Usage::default();

            'turns: loop {
                if self.invoke_ctx.cancel_token.is_cancelled() {
                    yield Event::Stopped { reason: StopReason::Cancelled, usage: total_usage };
                    break 'turns;
                }

                match self.pipeline.before_turn(&self.store, &self.config).await {
                    MiddlewareAction::Stop => {
                        yield Event::Stopped { reason: StopReason::MiddlewareStop, usage: total_usage };
                        break 'turns;
                    }
                    MiddlewareAction::InjectMessage(text) => {
                        self.store.push(Message::assistant(text.clone()));
                        yield Event::Assistant { delta: text, stopped_by_middleware: true };
                        yield Event::Stopped { reason: StopReason::MiddlewareStop, usage: total_usage };
                        break 'turns;
                    }
                    MiddlewareAction::Compact => {
                        if let Some((removed, old_tokens, new_tokens, usage)) = self.compact().await {
                            total_usage.add(usage);
                            let tool_call_id = Uuid::new_v4().to_string();
                            yield Event::CompactStart { tool_call_id: tool_call_id.clone(), messages_compacted: removed };
                            yield Event::CompactEnd { tool_call_id, old_context_tokens: old_tokens, new_context_tokens: new_tokens };
                        }
                    }
                    MiddlewareAction::Continue => {}
                }

                let tool_defs = available_tool_definitions(&self.tools, &self.tool_filter);
                let mut already_compacted_for_retry = false;
                let mut assembled = Message::assistant_empty();
                let mut turn_usage = Usage::default();
                let mut stream_failed = false;

                loop {
                    if self.invoke_ctx.cancel_token.is_cancelled() {
                        yield Event::Stopped { reason: StopReason::Cancelled, usage: total_usage };
                        break 'turns;
                    }

                    let stream_result = self
                        .backend
                        .stream(&self.system_prompt, self.store.messages(), &tool_defs, self.session_affinity.as_deref())
                        .await;

                    let mut chunk_stream = match stream_result {
                        Ok(s) => s,
                        Err(BackendError::InvalidRequest { oversized_context: true, .. }) if !already_compacted_for_retry => {
                            already_compacted_for_retry = true;
                            if let Some((removed, old_tokens, new_tokens, usage)) = self.compact().await {
                                total_usage.add(usage);
                                let tool_call_id = Uuid::new_v4().to_string();
                                yield Event::CompactStart { tool_call_id: tool_call_id.clone(), messages_compacted: removed };
                                yield Event::CompactEnd { tool_call_id, old_context_tokens: old_tokens, new_context_tokens: new_tokens };
                            }
                            continue;
                        }
                        Err(err) => {
                            warn!(error = %err, "backend request failed");
                            stream_failed = true;
                            break;
                        }
                    };

                    while let Some(item) = chunk_stream.next().await {
                        match item {
                            Ok(chunk) => {
                                if !chunk.message_delta.content.is_empty() {
                                    yield Event::Assistant { delta: chunk.message_delta.content.clone(), stopped_by_middleware: false };
                                }
                                if let Some(reasoning) = &chunk.message_delta.reasoning_content {
                                    if !reasoning.is_empty() {
                                        yield Event::Reasoning { delta: reasoning.clone() };
                                    }
                                }
                                assembled.merge_delta(&chunk.message_delta);
                                if let Some(usage) = chunk.usage {
                                    turn_usage.add(usage);
                                }
                            }
                            Err(err) => {
                                warn!(error = %err, "backend stream failed mid-turn");
                                stream_failed = true;
                                break;
                            }
                        }
                    }
                    break;
                }

                total_usage.add(turn_usage);

                if stream_failed {
                    yield Event::Stopped { reason: StopReason::Error, usage: total_usage };
                    break 'turns;
                }

                self.store.push(assembled.clone());

                if assembled.tool_calls.is_empty() {
                    match self.pipeline.after_turn(&self.store, &self.config, turn_usage).await {
                        MiddlewareAction::Stop => {
                            yield Event::Stopped { reason: StopReason::MiddlewareStop, usage: total_usage };
                        }
                        MiddlewareAction::InjectMessage(text) => {
                            self.store.push(Message::assistant(text.clone()));
                            yield Event::Assistant { delta: text, stopped_by_middleware: true };
                            yield Event::Stopped { reason: StopReason::MiddlewareStop, usage: total_usage };
                        }
                        MiddlewareAction::Compact | MiddlewareAction::Continue => {
                            yield Event::Stopped { reason: StopReason::EndTurn, usage: total_usage };
                        }
                    }
                    break 'turns;
                }

                let mut tool_calls = assembled.tool_calls.clone();
                tool_calls.sort_by_key(|call| call.index);
                let mut cancel_reason: Option<String> = None;

                for call in tool_calls {
                    yield Event::ToolCall {
                        tool_call_id: call.id.clone(),
                        name: call.name.clone(),
                        arguments: call.arguments.clone(),
                    };

                    if cancel_reason.is_none() && self.invoke_ctx.cancel_token.is_cancelled() {
                        cancel_reason = Some("Cancelled".to_string());
                    }

                    if let Some(reason) = &cancel_reason {
                        let content = cancelled_content(reason);
                        self.store.push(Message::tool_result(call.id.clone(), call.name.clone(), content.clone()));
                        yield Event::ToolResult {
                            tool_call_id: call.id,
                            name: call.name,
                            content,
                            is_error: false,
                            skipped: true,
                            skip_reason: Some(reason.clone()),
                            duration_ms: 0,
                        };
                        continue;
                    }

                    let Some(tool) = self.tools.get(&call.name) else {
                        let content = format!("unknown tool: {}", call.name);
                        self.store.push(Message::tool_result(call.id.clone(), call.name.clone(), content.clone()));
                        yield Event::ToolResult {
                            tool_call_id: call.id,
                            name: call.name,
                            content,
                            is_error: true,
                            skipped: false,
                            skip_reason: None,
                            duration_ms: 0,
                        };
                        continue;
                    };

                    let args: Value = match serde_json::from_str(&call.arguments) {
                        Ok(v) => v,
                        Err(_) => {
                            let content = "invalid tool arguments JSON".to_string();
                            self.store.push(Message::tool_result(call.id.clone(), call.name.clone(), content.clone()));
                            yield Event::ToolResult {
                                tool_call_id: call.id,
                                name: call.name,
                                content,
                                is_error: true,
                                skipped: false,
                                skip_reason: None,
                                duration_ms: 0,
                            };
                            continue;
                        }
                    };

                    if let Err(err) = self.tools.validate_arguments(&call.name, &args) {
                        let content = err.to_string();
                        self.store.push(Message::tool_result(call.id.clone(), call.name.clone(), content.clone()));
                        yield Event::ToolResult {
                            tool_call_id: call.id,
                            name: call.name,
                            content,
                            is_error: true,
                            skipped: false,
                            skip_reason: None,
                            duration_ms: 0,
                        };
                        continue;
                    }

                    let permission = self
                        .config
                        .tool_permissions
                        .get(&call.name)
                        .map(|p| matches!(p, agentix_config::ToolPermission::AlwaysAllow))
                        .unwrap_or_else(|| {
                            self.tools.permission(&call.name)
                                == Some(agentix_tools::ToolPermission::AlwaysAllow)
                        });

                    let mut gated: Option<(String, bool, Option<String>)> = None;
                    if !permission {
                        let (decision, note) = self.approval.ask(&call.name, &args, &call.id).await;
                        match decision {
                            ApprovalDecision::AllowOnce => {}
                            ApprovalDecision::AllowAlways => {
                                self.tools.set_always_allow(&call.name);
                            }
                            ApprovalDecision::RejectOnce { reason } => {
                                let content = note.unwrap_or(reason);
                                gated = Some((content.clone(), true, Some(content)));
                            }
                            ApprovalDecision::Cancel => {
                                let reason = note.unwrap_or_else(|| "User cancelled".to_string());
                                cancel_reason = Some(reason.clone());
                                gated = Some((cancelled_content(&reason), true, Some(reason)));
                            }
                        }
                    }

                    if let Some((content, skipped, skip_reason)) = gated {
                        self.store.push(Message::tool_result(call.id.clone(), call.name.clone(), content.clone()));
                        yield Event::ToolResult {
                            tool_call_id: call.id,
                            name: call.name,
                            content,
                            is_error: false,
                            skipped,
                            skip_reason,
                            duration_ms: 0,
                        };
                        continue;
                    }

                    let start = Instant::now();
                    let mut tool_events = tool.run(args, Arc::clone(&self.invoke_ctx)).await;
                    let mut final_result = None;
                    while let Some(event) = tool_events.next().await {
                        match event {
                            agentix_tools::ToolEvent::Progress(chunk) => {
                                yield Event::ToolStream { tool_call_id: call.id.clone(), chunk };
                            }
                            agentix_tools::ToolEvent::Done(result) => {
                                final_result = Some(result);
                            }
                        }
                    }
                    let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

                    let (content, is_error, skipped, skip_reason) = match final_result {
                        Some(Ok(output)) => (agentix_tools::truncate_output(output), false, false, None),
                        Some(Err(agentix_tools::ToolError::Cancelled)) => {
                            let reason = "Cancelled".to_string();
                            cancel_reason.get_or_insert_with(|| reason.clone());
                            (cancelled_content(&reason), false, true, Some(reason))
                        }
                        Some(Err(err)) => (err.to_string(), true, false, None),
                        None => ("tool produced no result".to_string(), true, false, None),
                    };

                    self.store.push(Message::tool_result(call.id.clone(), call.name.clone(), content.clone()));
                    yield Event::ToolResult { tool_call_id: call.id, name: call.name, content, is_error, skipped, skip_reason, duration_ms };
                }

                if cancel_reason.is_some() {
                    yield Event::Stopped { reason: StopReason::Cancelled, usage: total_usage };
                    break 'turns;
                }

                match self.pipeline.after_turn(&self.store, &self.config, turn_usage).await {
                    MiddlewareAction::Stop => {
                        yield Event::Stopped { reason: StopReason::MiddlewareStop, usage: total_usage };
                        break 'turns;
                    }
                    MiddlewareAction::InjectMessage(text) => {
                        self.store.push(Message::assistant(text.clone()));
                        yield Event::Assistant { delta: text, stopped_by_middleware: true };
                        yield Event::Stopped { reason: StopReason::MiddlewareStop, usage: total_usage };
                        break 'turns;
                    }
                    MiddlewareAction::Compact | MiddlewareAction::Continue => {}
                }
            }
        })
    }

    /// Summarize and drop everything but the leading system message
    /// and the most recent messages, via an auxiliary non-streaming
    /// backend call. Returns `None` (and leaves the store untouched)
    /// if the summarization call itself fails — compaction is a
    /// best-effort shrink, not something worth failing the turn over.
    ///
    /// On success, returns `(messages_removed, old_context_tokens,
    /// new_context_tokens, usage)`.
    async fn compact(&mut self) -> Option<(usize, u64, u64, Usage)> {
        let old_context_tokens = self.store.estimated_tokens();
        match self.backend.complete(SUMMARIZE_SYSTEM_PROMPT, self.store.messages(), &[]).await {
            Ok((summary_message, usage)) => {
                let summary = Message::system(format!("Summary of earlier conversation:\n{}", summary_message.content));
                let removed = self.store.compact(AutoCompactMiddleware::keep_recent(), summary);
                if removed == 0 {
                    return None;
                }
                Some((removed, old_context_tokens, self.store.estimated_tokens(), usage))
            }
            Err(err) => {
                warn!(error = %err, "context compaction summarization failed; skipping this round");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentix_test::mocks::{MockApprovalGate, MockBackend};
    use agentix_llm::Chunk;

    fn tool_call_chunk(id: &str, name: &str, arguments: &str) -> Message {
        let mut delta = Message::assistant_empty();
        delta.tool_calls.push(agentix_types::ToolCall {
            index: 0,
            id: id.to_string(),
            name: name.to_string(),
            arguments: arguments.to_string(),
        });
        delta
    }

    fn loop_with(backend: MockBackend, approval: MockApprovalGate) -> AgentLoop {
        AgentLoop::builder()
            .backend(Arc::new(backend))
            .approval(Arc::new(approval))
            .workspace_root(std::env::temp_dir())
            .build()
            .unwrap()
    }

    async fn collect(stream: EventStream) -> Vec<Event> {
        stream.collect().await
    }

    #[tokio::test]
    async fn max_turns_zero_injects_notice_and_stops_with_one_assistant_event() {
        let config = RuntimeConfig { max_turns: 0, ..RuntimeConfig::default() };
        let agent_loop = AgentLoop::builder()
            .backend(Arc::new(MockBackend::new()))
            .approval(Arc::new(MockApprovalGate::new()))
            .config(config)
            .workspace_root(std::env::temp_dir())
            .build()
            .unwrap();

        let events = collect(agent_loop.run("hi".to_string())).await;

        let assistant_events: Vec<_> = events
            .iter()
            .filter(|e| matches!(e, Event::Assistant { stopped_by_middleware: true, .. }))
            .collect();
        assert_eq!(assistant_events.len(), 1);
        assert!(matches!(events.last(), Some(Event::Stopped { reason: StopReason::MiddlewareStop, .. })));
    }

    #[tokio::test]
    async fn max_price_zero_stops_before_first_backend_call() {
        let config = RuntimeConfig { max_price_usd: 0.0, ..RuntimeConfig::default() };
        let backend = MockBackend::new();
        let agent_loop = AgentLoop::builder()
            .backend(Arc::new(backend.clone()))
            .approval(Arc::new(MockApprovalGate::new()))
            .config(config)
            .workspace_root(std::env::temp_dir())
            .build()
            .unwrap();

        let events = collect(agent_loop.run("hi".to_string())).await;

        assert!(events.iter().any(|e| matches!(e, Event::Assistant { stopped_by_middleware: true, .. })));
        assert!(backend.captured_requests().is_empty());
    }

    #[tokio::test]
    async fn invalid_json_tool_arguments_are_reported_without_invoking_the_tool() {
        let backend = MockBackend::new().with_stream_response(vec![Chunk {
            message_delta: tool_call_chunk("1", "bash", "not json"),
            usage: Some(Usage::default()),
        }]);
        let agent_loop = loop_with(backend, MockApprovalGate::new());

        let events = collect(agent_loop.run("hi".to_string())).await;

        let result = events
            .iter()
            .find_map(|e| match e {
                Event::ToolResult { content, is_error, skipped, .. } => Some((content.clone(), *is_error, *skipped)),
                _ => None,
            })
            .unwrap();
        assert!(result.0.contains("invalid tool arguments JSON"));
        assert!(result.1);
        assert!(!result.2);
    }

    #[tokio::test]
    async fn schema_invalid_tool_arguments_are_rejected_before_approval() {
        let backend = MockBackend::new().with_stream_response(vec![Chunk {
            message_delta: tool_call_chunk("1", "bash", "{}"),
            usage: Some(Usage::default()),
        }]);
        let approval = MockApprovalGate::new();
        let agent_loop = loop_with(backend, approval);

        let events = collect(agent_loop.run("hi".to_string())).await;

        let result = events.iter().find_map(|e| match e {
            Event::ToolResult { is_error, .. } => Some(*is_error),
            _ => None,
        });
        assert_eq!(result, Some(true));
    }

    #[tokio::test]
    async fn denied_tool_call_is_reported_as_skipped_not_error() {
        let backend = MockBackend::new().with_stream_response(vec![Chunk {
            message_delta: tool_call_chunk("1", "bash", r#"{"command": "echo hi"}"#),
            usage: Some(Usage::default()),
        }]);
        let approval = MockApprovalGate::new()
            .with_decision(ApprovalDecision::RejectOnce { reason: "no".to_string() });
        let agent_loop = loop_with(backend, approval);

        let events = collect(agent_loop.run("hi".to_string())).await;

        let (is_error, skipped, skip_reason) = events
            .iter()
            .find_map(|e| match e {
                Event::ToolResult { is_error, skipped, skip_reason, .. } => {
                    Some((*is_error, *skipped, skip_reason.clone()))
                }
                _ => None,
            })
            .unwrap();
        assert!(!is_error);
        assert!(skipped);
        assert_eq!(skip_reason.as_deref(), Some("no"));
    }

    #[tokio::test]
    async fn cancel_decision_tags_the_result_and_ends_the_turn_as_cancelled() {
        let backend = MockBackend::new().with_stream_response(vec![Chunk {
            message_delta: tool_call_chunk("1", "bash", r#"{"command": "echo hi"}"#),
            usage: Some(Usage::default()),
        }]);
        let approval = MockApprovalGate::new().with_decision(ApprovalDecision::Cancel);
        let agent_loop = loop_with(backend, approval);

        let events = collect(agent_loop.run("hi".to_string())).await;

        let content = events
            .iter()
            .find_map(|e| match e {
                Event::ToolResult { content, skipped, .. } if *skipped => Some(content.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(content, "<cancelled>User cancelled</cancelled>");
        assert!(matches!(events.last(), Some(Event::Stopped { reason: StopReason::Cancelled, .. })));
    }

    #[tokio::test]
    async fn pre_cancelled_token_stops_before_the_first_backend_call() {
        let backend = MockBackend::new();
        let agent_loop = AgentLoop::builder()
            .backend(Arc::new(backend.clone()))
            .approval(Arc::new(MockApprovalGate::new()))
            .workspace_root(std::env::temp_dir())
            .build()
            .unwrap();
        agent_loop.cancel_token().cancel();

        let events = collect(agent_loop.run("hi".to_string())).await;

        assert!(backend.captured_requests().is_empty());
        assert!(matches!(events.last(), Some(Event::Stopped { reason: StopReason::Cancelled, .. })));
    }
}
