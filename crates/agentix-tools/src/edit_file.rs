use std::sync::Arc;

use async_stream::stream;
use serde_json::{json, Value};

use crate::{InvokeContext, Tool, ToolError, ToolEvent, ToolEventStream, ToolPermission};

/// Replace one exact occurrence of `old_string` with `new_string` in a file.
pub struct EditFileTool;

#[async_trait::async_trait]
impl Tool for EditFileTool {
    fn name(&self) -> &str {
        "edit_file"
    }

    fn description(&self) -> &str {
        "Replace an exact string occurrence in a file with a new string."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string" },
                "old_string": { "type": "string" },
                "new_string": { "type": "string" },
                "replace_all": { "type": "boolean", "default": false },
            },
            "required": ["path", "old_string", "new_string"],
        })
    }

    fn default_permission(&self) -> ToolPermission {
        ToolPermission::Ask
    }

    async fn run(&self, args: Value, ctx: Arc<InvokeContext>) -> ToolEventStream {
        let path = args.get("path").and_then(Value::as_str).map(str::to_string);
        let old_string = args.get("old_string").and_then(Value::as_str).map(str::to_string);
        let new_string = args.get("new_string").and_then(Value::as_str).map(str::to_string);
        let replace_all = args.get("replace_all").and_then(Value::as_bool).unwrap_or(false);

        let s = stream! {
            let (Some(path), Some(old_string), Some(new_string)) = (path, old_string, new_string) else {
                yield ToolEvent::Done(Err(ToolError::InvalidArguments(
                    "missing `path`, `old_string`, or `new_string`".to_string(),
                )));
                return;
            };
            let resolved = ctx.workspace_root.join(&path);
            let content = match tokio::fs::read_to_string(&resolved).await {
                Ok(c) => c,
                Err(_) => {
                    yield ToolEvent::Done(Err(ToolError::PathNotFound(path)));
                    return;
                }
            };

            let occurrences = content.matches(&old_string).count();
            if occurrences == 0 {
                yield ToolEvent::Done(Err(ToolError::ExecutionFailed(format!(
                    "`old_string` not found in {path}"
                ))));
                return;
            }
            if occurrences > 1 && !replace_all {
                yield ToolEvent::Done(Err(ToolError::ExecutionFailed(format!(
                    "`old_string` matches {occurrences} locations in {path}; pass replace_all or narrow the match"
                ))));
                return;
            }

            let updated = if replace_all {
                content.replace(&old_string, &new_string)
            } else {
                content.replacen(&old_string, &new_string, 1)
            };

            match tokio::fs::write(&resolved, &updated).await {
                Ok(()) => yield ToolEvent::Done(Ok(format!("replaced {occurrences} occurrence(s) in {path}"))),
                Err(e) => yield ToolEvent::Done(Err(ToolError::Io(e))),
            }
        };
        Box::pin(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ToolResult;
    use futures::StreamExt;

    async fn run_and_collect(args: Value, root: std::path::PathBuf) -> ToolResult {
        let ctx = Arc::new(InvokeContext::new(root));
        let mut stream = EditFileTool.run(args, ctx).await;
        let mut result = None;
        while let Some(event) = stream.next().await {
            if let ToolEvent::Done(r) = event {
                result = Some(r);
            }
        }
        result.unwrap()
    }

    #[tokio::test]
    async fn replaces_single_occurrence() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("a.txt"), "foo bar").unwrap();
        run_and_collect(
            json!({ "path": "a.txt", "old_string": "foo", "new_string": "baz" }),
            tmp.path().to_path_buf(),
        )
        .await
        .unwrap();
        assert_eq!(std::fs::read_to_string(tmp.path().join("a.txt")).unwrap(), "baz bar");
    }

    #[tokio::test]
    async fn ambiguous_match_without_replace_all_errors() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("a.txt"), "foo foo").unwrap();
        let err = run_and_collect(
            json!({ "path": "a.txt", "old_string": "foo", "new_string": "baz" }),
            tmp.path().to_path_buf(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ToolError::ExecutionFailed(_)));
    }

    #[tokio::test]
    async fn replace_all_replaces_every_occurrence() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("a.txt"), "foo foo").unwrap();
        run_and_collect(
            json!({ "path": "a.txt", "old_string": "foo", "new_string": "baz", "replace_all": true }),
            tmp.path().to_path_buf(),
        )
        .await
        .unwrap();
        assert_eq!(std::fs::read_to_string(tmp.path().join("a.txt")).unwrap(), "baz baz");
    }

    #[tokio::test]
    async fn missing_old_string_not_found_errors() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("a.txt"), "hello").unwrap();
        let err = run_and_collect(
            json!({ "path": "a.txt", "old_string": "nope", "new_string": "x" }),
            tmp.path().to_path_buf(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ToolError::ExecutionFailed(_)));
    }
}
