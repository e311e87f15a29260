use std::sync::Arc;

use async_stream::stream;
use serde_json::{json, Value};

use crate::{InvokeContext, Tool, ToolError, ToolEvent, ToolEventStream, ToolPermission};

/// Ask the user a clarifying question mid-turn.
///
/// Requires the host to have installed an [`AskUserCallback`](crate::AskUserCallback)
/// on the [`InvokeContext`]; without one, the tool fails immediately
/// rather than stalling the loop waiting for input that can never arrive.
pub struct AskUserQuestionTool;

#[async_trait::async_trait]
impl Tool for AskUserQuestionTool {
    fn name(&self) -> &str {
        "ask_user_question"
    }

    fn description(&self) -> &str {
        "Ask the user a clarifying question and wait for their answer."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "question": { "type": "string" },
                "suggested_answers": {
                    "type": "array",
                    "items": { "type": "string" },
                    "default": [],
                },
            },
            "required": ["question"],
        })
    }

    fn default_permission(&self) -> ToolPermission {
        ToolPermission::AlwaysAllow
    }

    async fn run(&self, args: Value, ctx: Arc<InvokeContext>) -> ToolEventStream {
        let question = args.get("question").and_then(Value::as_str).map(str::to_string);
        let suggested: Vec<String> = args
            .get("suggested_answers")
            .and_then(Value::as_array)
            .map(|a| a.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default();

        let s = stream! {
            let Some(question) = question else {
                yield ToolEvent::Done(Err(ToolError::InvalidArguments("missing `question`".to_string())));
                return;
            };
            let Some(callback) = ctx.ask_user.clone() else {
                yield ToolEvent::Done(Err(ToolError::ExecutionFailed(
                    "host has no interactive surface to ask the user".to_string(),
                )));
                return;
            };
            let answer = callback(question, suggested).await;
            yield ToolEvent::Done(Ok(answer));
        };
        Box::pin(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ToolResult;
    use futures::StreamExt;

    async fn run_and_collect(args: Value, ctx: Arc<InvokeContext>) -> ToolResult {
        let mut stream = AskUserQuestionTool.run(args, ctx).await;
        let mut result = None;
        while let Some(event) = stream.next().await {
            if let ToolEvent::Done(r) = event {
                result = Some(r);
            }
        }
        result.unwrap()
    }

    #[tokio::test]
    async fn without_callback_fails() {
        let ctx = Arc::new(InvokeContext::new(std::env::temp_dir()));
        let err = run_and_collect(json!({ "question": "continue?" }), ctx).await.unwrap_err();
        assert!(matches!(err, ToolError::ExecutionFailed(_)));
    }

    #[tokio::test]
    async fn with_callback_returns_its_answer() {
        let ctx = InvokeContext::new(std::env::temp_dir())
            .with_ask_user(Arc::new(|_q, _suggestions| Box::pin(async { "yes".to_string() })));
        let answer = run_and_collect(json!({ "question": "continue?" }), Arc::new(ctx)).await.unwrap();
        assert_eq!(answer, "yes");
    }
}
