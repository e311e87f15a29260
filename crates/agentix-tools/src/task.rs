use std::sync::Arc;

use async_stream::stream;
use serde_json::{json, Value};

use crate::{InvokeContext, Tool, ToolError, ToolEvent, ToolEventStream, ToolPermission};
use crate::subagent::{SubAgentRequest, SubAgentSpawnError};

/// Delegate a sub-task to a fresh sub-agent session and wait for its result.
pub struct TaskTool;

#[async_trait::async_trait]
impl Tool for TaskTool {
    fn name(&self) -> &str {
        "task"
    }

    fn description(&self) -> &str {
        "Delegate a focused sub-task to a named sub-agent and return its result."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "description": { "type": "string", "description": "Short description of the task" },
                "prompt": { "type": "string", "description": "Full instructions for the sub-agent" },
                "agent": { "type": "string", "description": "Name of the sub-agent profile to run, e.g. \"explore\"" },
            },
            "required": ["description", "prompt", "agent"],
        })
    }

    fn default_permission(&self) -> ToolPermission {
        ToolPermission::AlwaysAllow
    }

    async fn run(&self, args: Value, ctx: Arc<InvokeContext>) -> ToolEventStream {
        let description = args.get("description").and_then(Value::as_str).map(str::to_string);
        let prompt = args.get("prompt").and_then(Value::as_str).map(str::to_string);
        let agent = args.get("agent").and_then(Value::as_str).map(str::to_string);

        let s = stream! {
            let (Some(description), Some(prompt), Some(target_profile)) = (description, prompt, agent) else {
                yield ToolEvent::Done(Err(ToolError::InvalidArguments(
                    "missing `description`, `prompt`, or `agent`".to_string(),
                )));
                return;
            };
            let Some(spawner) = ctx.subagent_spawner().await else {
                yield ToolEvent::Done(Err(ToolError::ExecutionFailed(
                    "host has no sub-agent support configured".to_string(),
                )));
                return;
            };
            match spawner.spawn(SubAgentRequest { target_profile, description, prompt }).await {
                Ok(result) => {
                    let payload = serde_json::json!({
                        "response": result.response,
                        "turns_used": result.turns_used,
                        "completed": result.completed,
                    });
                    yield ToolEvent::Done(Ok(payload.to_string()));
                }
                Err(err @ (SubAgentSpawnError::UnknownProfile(_) | SubAgentSpawnError::WrongAgentType(_))) => {
                    yield ToolEvent::Done(Err(ToolError::InvalidArguments(err.to_string())));
                }
                Err(SubAgentSpawnError::Failed(reason)) => {
                    yield ToolEvent::Done(Err(ToolError::ExecutionFailed(reason)));
                }
            }
        };
        Box::pin(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subagent::{SubAgentResult, SubAgentSpawner};
    use crate::ToolResult;
    use futures::StreamExt;

    enum StubOutcome {
        Result(SubAgentResult),
        Err(SubAgentSpawnError),
    }

    struct StubSpawner(StubOutcome);

    #[async_trait::async_trait]
    impl SubAgentSpawner for StubSpawner {
        async fn spawn(&self, _request: SubAgentRequest) -> Result<SubAgentResult, SubAgentSpawnError> {
            match &self.0 {
                StubOutcome::Result(result) => Ok(result.clone()),
                StubOutcome::Err(err) => Err(err.clone()),
            }
        }
    }

    async fn run_and_collect(args: Value, ctx: InvokeContext) -> ToolResult {
        let mut stream = TaskTool.run(args, Arc::new(ctx)).await;
        let mut result = None;
        while let Some(event) = stream.next().await {
            if let ToolEvent::Done(r) = event {
                result = Some(r);
            }
        }
        result.unwrap()
    }

    #[tokio::test]
    async fn without_spawner_fails() {
        let ctx = InvokeContext::new(std::env::temp_dir());
        let err = run_and_collect(json!({ "description": "x", "prompt": "y", "agent": "explore" }), ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::ExecutionFailed(_)));
    }

    #[tokio::test]
    async fn missing_agent_is_invalid_arguments() {
        let ctx = InvokeContext::new(std::env::temp_dir());
        let err = run_and_collect(json!({ "description": "x", "prompt": "y" }), ctx).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[tokio::test]
    async fn completed_subagent_returns_full_result_payload() {
        let ctx = InvokeContext::new(std::env::temp_dir());
        ctx.set_subagent_spawner(Some(Arc::new(StubSpawner(StubOutcome::Result(SubAgentResult {
            completed: true,
            response: "done".to_string(),
            turns_used: 2,
        })))))
        .await;
        let output = run_and_collect(json!({ "description": "x", "prompt": "y", "agent": "explore" }), ctx)
            .await
            .unwrap();
        let payload: Value = serde_json::from_str(&output).unwrap();
        assert_eq!(payload["response"], "done");
        assert_eq!(payload["turns_used"], 2);
        assert_eq!(payload["completed"], true);
    }

    #[tokio::test]
    async fn incomplete_subagent_still_returns_a_payload_not_an_error() {
        let ctx = InvokeContext::new(std::env::temp_dir());
        ctx.set_subagent_spawner(Some(Arc::new(StubSpawner(StubOutcome::Result(SubAgentResult {
            completed: false,
            response: "ran out of turns".to_string(),
            turns_used: 10,
        })))))
        .await;
        let output = run_and_collect(json!({ "description": "x", "prompt": "y", "agent": "explore" }), ctx)
            .await
            .unwrap();
        let payload: Value = serde_json::from_str(&output).unwrap();
        assert_eq!(payload["completed"], false);
    }

    #[tokio::test]
    async fn unknown_profile_is_invalid_arguments_not_execution_failed() {
        let ctx = InvokeContext::new(std::env::temp_dir());
        ctx.set_subagent_spawner(Some(Arc::new(StubSpawner(StubOutcome::Err(
            SubAgentSpawnError::UnknownProfile("bogus".to_string()),
        )))))
        .await;
        let err = run_and_collect(json!({ "description": "x", "prompt": "y", "agent": "bogus" }), ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }
}
