use std::sync::Arc;

use async_stream::stream;
use serde_json::{json, Value};

use crate::{InvokeContext, Tool, ToolError, ToolEvent, ToolEventStream, ToolPermission};

/// Write content to a file, creating parent directories as needed.
pub struct WriteFileTool;

#[async_trait::async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Write content to a file, overwriting it if it exists."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "Path to the file, relative to the workspace root" },
                "content": { "type": "string", "description": "Content to write" },
            },
            "required": ["path", "content"],
        })
    }

    fn default_permission(&self) -> ToolPermission {
        ToolPermission::Ask
    }

    async fn run(&self, args: Value, ctx: Arc<InvokeContext>) -> ToolEventStream {
        let path = args.get("path").and_then(Value::as_str).map(str::to_string);
        let content = args.get("content").and_then(Value::as_str).map(str::to_string);
        let s = stream! {
            let (Some(path), Some(content)) = (path, content) else {
                yield ToolEvent::Done(Err(ToolError::InvalidArguments("missing `path` or `content`".to_string())));
                return;
            };
            let resolved = ctx.workspace_root.join(&path);
            if let Some(parent) = resolved.parent() {
                if let Err(e) = tokio::fs::create_dir_all(parent).await {
                    yield ToolEvent::Done(Err(ToolError::Io(e)));
                    return;
                }
            }
            match tokio::fs::write(&resolved, &content).await {
                Ok(()) => yield ToolEvent::Done(Ok(format!("wrote {} bytes to {path}", content.len()))),
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
        let mut stream = WriteFileTool.run(args, ctx).await;
        let mut result = None;
        while let Some(event) = stream.next().await {
            if let ToolEvent::Done(r) = event {
                result = Some(r);
            }
        }
        result.unwrap()
    }

    #[tokio::test]
    async fn writes_file_and_creates_parents() {
        let tmp = tempfile::tempdir().unwrap();
        run_and_collect(json!({ "path": "nested/a.txt", "content": "hi" }), tmp.path().to_path_buf())
            .await
            .unwrap();
        let written = std::fs::read_to_string(tmp.path().join("nested/a.txt")).unwrap();
        assert_eq!(written, "hi");
    }

    #[tokio::test]
    async fn missing_arguments_is_invalid() {
        let tmp = tempfile::tempdir().unwrap();
        let err = run_and_collect(json!({ "path": "a.txt" }), tmp.path().to_path_buf()).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }
}
