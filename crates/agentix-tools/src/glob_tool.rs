use std::sync::Arc;

use async_stream::stream;
use serde_json::{json, Value};

use crate::{truncate_output, InvokeContext, Tool, ToolError, ToolEvent, ToolEventStream, ToolPermission};

/// List files in the workspace matching a glob pattern.
pub struct GlobTool;

#[async_trait::async_trait]
impl Tool for GlobTool {
    fn name(&self) -> &str {
        "glob"
    }

    fn description(&self) -> &str {
        "List files matching a glob pattern, relative to the workspace root."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "pattern": { "type": "string", "description": "Glob pattern, e.g. `src/**/*.rs`" },
            },
            "required": ["pattern"],
        })
    }

    fn default_permission(&self) -> ToolPermission {
        ToolPermission::AlwaysAllow
    }

    async fn run(&self, args: Value, ctx: Arc<InvokeContext>) -> ToolEventStream {
        let pattern = args.get("pattern").and_then(Value::as_str).map(str::to_string);
        let s = stream! {
            let Some(pattern) = pattern else {
                yield ToolEvent::Done(Err(ToolError::InvalidArguments("missing `pattern`".to_string())));
                return;
            };
            let full_pattern = ctx.workspace_root.join(&pattern);
            let full_pattern = full_pattern.to_string_lossy().to_string();

            let entries = match glob::glob(&full_pattern) {
                Ok(paths) => paths,
                Err(e) => {
                    yield ToolEvent::Done(Err(ToolError::InvalidArguments(e.to_string())));
                    return;
                }
            };

            let mut matches = Vec::new();
            for entry in entries {
                match entry {
                    Ok(path) => matches.push(
                        path.strip_prefix(&ctx.workspace_root)
                            .unwrap_or(&path)
                            .to_string_lossy()
                            .to_string(),
                    ),
                    Err(e) => matches.push(format!("<error: {e}>")),
                }
            }
            matches.sort();
            yield ToolEvent::Done(Ok(truncate_output(matches.join("\n"))));
        };
        Box::pin(s)
    }
}
