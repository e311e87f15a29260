use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::Semaphore;
use tracing::warn;

use agentix_approval::{ApprovalGate, NullApprovalGate};
use agentix_config::{AgentRegistry, AgentType, RuntimeConfig};
use agentix_llm::Backend;
use agentix_tools::{SubAgentRequest, SubAgentResult, SubAgentSpawnError, SubAgentSpawner, ToolFilter, ToolRegistry};
use agentix_types::{Event, StopReason};

use crate::agent_loop::AgentLoop;

/// Default time budget for one sub-agent run.
const DEFAULT_SUBAGENT_TIMEOUT: Duration = Duration::from_secs(300);

/// Bounds how many sub-agents can run at once across a host.
///
/// Built around a plain counting semaphore rather than the depth- and
/// lifecycle-tracking pool a multi-frontend host needs, since nothing
/// in this stack exposes sub-agent status to a user interface — the
/// `task` tool only ever waits for the final result.
pub struct SubAgentPool {
    semaphore: Arc<Semaphore>,
}

impl SubAgentPool {
    /// A pool allowing at most `max_concurrent` sub-agents to run at once.
    #[must_use]
    pub fn new(max_concurrent: usize) -> Self {
        Self { semaphore: Arc::new(Semaphore::new(max_concurrent.max(1))) }
    }
}

impl Default for SubAgentPool {
    fn default() -> Self {
        Self::new(4)
    }
}

/// Implements [`SubAgentSpawner`] by running a fresh, short-lived
/// [`AgentLoop`] to completion for each request.
///
/// The child loop gets the builtin tool registry minus `task` itself —
/// sub-agents in this stack don't spawn further sub-agents, which
/// bounds recursion without needing the teacher's explicit depth
/// counter.
pub struct SubAgentExecutor {
    backend: Arc<dyn Backend>,
    approval: Arc<dyn ApprovalGate>,
    config: RuntimeConfig,
    registry: AgentRegistry,
    workspace_root: PathBuf,
    pool: Arc<SubAgentPool>,
    timeout: Duration,
}

impl SubAgentExecutor {
    /// Build an executor that spawns children against `backend`,
    /// sharing `config` and `workspace_root` with the parent loop.
    /// Sub-agent tool calls go through `approval` just like the
    /// parent's — a sub-agent inherits the parent's trust level rather
    /// than getting its own. Resolves `task` tool targets against the
    /// builtin profile registry; use [`Self::with_registry`] to
    /// recognize project-discovered sub-agent profiles too.
    #[must_use]
    pub fn new(
        backend: Arc<dyn Backend>,
        approval: Arc<dyn ApprovalGate>,
        config: RuntimeConfig,
        workspace_root: PathBuf,
        pool: Arc<SubAgentPool>,
    ) -> Self {
        Self {
            backend,
            approval,
            config,
            registry: AgentRegistry::with_builtins(),
            workspace_root,
            pool,
            timeout: DEFAULT_SUBAGENT_TIMEOUT,
        }
    }

    /// Build an executor whose sub-agents never ask for approval —
    /// appropriate when the parent profile is `auto_approve`.
    #[must_use]
    pub fn with_auto_approve(backend: Arc<dyn Backend>, config: RuntimeConfig, workspace_root: PathBuf, pool: Arc<SubAgentPool>) -> Self {
        Self::new(backend, Arc::new(NullApprovalGate), config, workspace_root, pool)
    }

    /// Replace the default (builtins-only) profile registry used to
    /// resolve `task` tool targets.
    #[must_use]
    pub fn with_registry(mut self, registry: AgentRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Override the default 5-minute per-sub-agent timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl SubAgentSpawner for SubAgentExecutor {
    async fn spawn(&self, request: SubAgentRequest) -> Result<SubAgentResult, SubAgentSpawnError> {
        let profile = self
            .registry
            .get(&request.target_profile)
            .ok_or_else(|| SubAgentSpawnError::UnknownProfile(request.target_profile.clone()))?;
        if profile.agent_type != AgentType::Subagent {
            return Err(SubAgentSpawnError::WrongAgentType(request.target_profile.clone()));
        }

        let _permit = self
            .pool
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| SubAgentSpawnError::Failed(e.to_string()))?;

        let effective_config = profile.apply_to_config(&self.config);
        let tool_filter = ToolFilter { enabled: profile.enabled_tools.clone(), disabled: profile.disabled_tools.clone() };

        let system_prompt = format!(
            "{}\n\nYour task:\n\n{}\n\nComplete it and give a clear, concise final answer. Do not ask for \
             clarification; work with what you have.",
            profile.system_prompt, request.description,
        );

        let child = AgentLoop::builder()
            .backend(Arc::clone(&self.backend))
            .tools(ToolRegistry::with_builtins())
            .tool_filter(tool_filter)
            .approval(Arc::clone(&self.approval))
            .config(effective_config)
            .system_prompt(system_prompt)
            .workspace_root(self.workspace_root.clone())
            .build()
            .map_err(|e| SubAgentSpawnError::Failed(e.to_string()))?;

        let stream = child.run(request.prompt);

        match tokio::time::timeout(self.timeout, drain(stream)).await {
            Ok((response, turns_used, StopReason::EndTurn)) => {
                Ok(SubAgentResult { completed: true, response, turns_used })
            }
            Ok((response, turns_used, reason)) => {
                warn!(?reason, "sub-agent stopped without a clean end turn");
                Ok(SubAgentResult { completed: false, response, turns_used })
            }
            Err(_elapsed) => Ok(SubAgentResult {
                completed: false,
                response: "sub-agent timed out before producing a final answer".to_string(),
                turns_used: 0,
            }),
        }
    }
}

/// Drain a sub-agent's event stream, returning its final assistant
/// text, a rough count of turns taken, and why it stopped.
///
/// "Final" text is everything accumulated since the last tool result —
/// earlier assistant text in the same run preceded a tool call and
/// isn't the answer. Turn count is approximated by counting each batch
/// of tool calls as one turn and adding one for the closing turn; it's
/// a diagnostic, not something callers should rely on precisely.
async fn drain(mut stream: crate::agent_loop::EventStream) -> (String, u32, StopReason) {
    let mut response = String::new();
    let mut tool_rounds: u32 = 0;
    let mut saw_tool_call_this_round = false;
    let mut reason = StopReason::EndTurn;

    while let Some(event) = stream.next().await {
        match event {
            Event::Assistant { delta, .. } => response.push_str(&delta),
            Event::ToolCall { .. } => saw_tool_call_this_round = true,
            Event::ToolResult { .. } => {
                response.clear();
                if saw_tool_call_this_round {
                    tool_rounds = tool_rounds.saturating_add(1);
                    saw_tool_call_this_round = false;
                }
            }
            Event::Stopped { reason: r, .. } => reason = r,
            _ => {}
        }
    }

    (response, tool_rounds.saturating_add(1), reason)
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentix_test::mocks::{MockApprovalGate, MockBackend};

    #[test]
    fn pool_new_floors_at_one_permit() {
        let pool = SubAgentPool::new(0);
        assert_eq!(pool.semaphore.available_permits(), 1);
    }

    fn executor() -> SubAgentExecutor {
        SubAgentExecutor::new(
            Arc::new(MockBackend::new()),
            Arc::new(MockApprovalGate::new()),
            RuntimeConfig::default(),
            std::env::temp_dir(),
            Arc::new(SubAgentPool::default()),
        )
    }

    #[tokio::test]
    async fn unknown_target_profile_is_rejected_before_spawning() {
        let request = SubAgentRequest {
            target_profile: "bogus".to_string(),
            description: "x".to_string(),
            prompt: "y".to_string(),
        };
        let err = executor().spawn(request).await.unwrap_err();
        assert!(matches!(err, SubAgentSpawnError::UnknownProfile(name) if name == "bogus"));
    }

    #[tokio::test]
    async fn primary_profile_is_not_a_valid_task_target() {
        let request = SubAgentRequest {
            target_profile: "default".to_string(),
            description: "x".to_string(),
            prompt: "y".to_string(),
        };
        let err = executor().spawn(request).await.unwrap_err();
        assert!(matches!(err, SubAgentSpawnError::WrongAgentType(name) if name == "default"));
    }

    #[tokio::test]
    async fn explore_profile_spawns_and_completes() {
        let request = SubAgentRequest {
            target_profile: "explore".to_string(),
            description: "investigate".to_string(),
            prompt: "look into it".to_string(),
        };
        let result = executor().spawn(request).await.unwrap();
        assert!(result.completed);
    }

    #[tokio::test]
    async fn drain_extracts_text_since_last_tool_result() {
        use futures::stream;

        let events = vec![
            Event::Assistant { delta: "looking it up".to_string(), stopped_by_middleware: false },
            Event::ToolResult {
                tool_call_id: "1".to_string(),
                name: "bash".to_string(),
                content: "ok".to_string(),
                is_error: false,
                skipped: false,
                skip_reason: None,
                duration_ms: 5,
            },
            Event::Assistant { delta: "the answer is 42".to_string(), stopped_by_middleware: false },
            Event::Stopped { reason: StopReason::EndTurn, usage: agentix_types::Usage::default() },
        ];
        let boxed: crate::agent_loop::EventStream = Box::pin(stream::iter(events));
        let (response, _turns, reason) = drain(boxed).await;
        assert_eq!(response, "the answer is 42");
        assert_eq!(reason, StopReason::EndTurn);
    }
}
