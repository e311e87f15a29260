use std::sync::Arc;

use async_stream::stream;
use serde_json::{json, Value};

use crate::{truncate_output, InvokeContext, Tool, ToolError, ToolEvent, ToolEventStream, ToolPermission};

/// Read a file's contents, resolving relative paths against the
/// workspace root.
pub struct ReadFileTool;

#[async_trait::async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read the contents of a file."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "Path to the file, relative to the workspace root" },
            },
            "required": ["path"],
        })
    }

    fn default_permission(&self) -> ToolPermission {
        ToolPermission::AlwaysAllow
    }

    async fn run(&self, args: Value, ctx: Arc<InvokeContext>) -> ToolEventStream {
        let path = args.get("path").and_then(Value::as_str).map(str::to_string);
        let s = stream! {
            let Some(path) = path else {
                yield ToolEvent::Done(Err(ToolError::InvalidArguments("missing `path`".to_string())));
                return;
            };
            let resolved = ctx.workspace_root.join(&path);
            if !resolved.exists() {
                yield ToolEvent::Done(Err(ToolError::PathNotFound(path)));
                return;
            }
            match tokio::fs::read_to_string(&resolved).await {
                Ok(content) => yield ToolEvent::Done(Ok(truncate_output(content))),
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
        let mut stream = ReadFileTool.run(args, ctx).await;
        let mut result = None;
        while let Some(event) = stream.next().await {
            if let ToolEvent::Done(r) = event {
                result = Some(r);
            }
        }
        result.unwrap()
    }

    #[tokio::test]
    async fn reads_existing_file() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("a.txt"), "hello").unwrap();
        let content = run_and_collect(json!({ "path": "a.txt" }), tmp.path().to_path_buf()).await.unwrap();
        assert_eq!(content, "hello");
    }

    #[tokio::test]
    async fn missing_file_is_path_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let err = run_and_collect(json!({ "path": "missing.txt" }), tmp.path().to_path_buf()).await.unwrap_err();
        assert!(matches!(err, ToolError::PathNotFound(_)));
    }
}
