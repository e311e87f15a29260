use std::process::Stdio;
use std::sync::Arc;

use async_stream::stream;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::warn;

use crate::{truncate_output, InvokeContext, Tool, ToolError, ToolEvent, ToolEventStream, ToolPermission};

/// Marker the tool appends to every command so it can recover the
/// shell's working directory afterward without spawning a second
/// process — `cd` only affects the child shell, so without this the
/// tool could never observe a `cd` the model issued.
const CWD_SENTINEL: &str = "__AGENTIX_CWD__";

/// Run a shell command, streaming its combined stdout/stderr as
/// progress and tracking working-directory changes across calls.
pub struct BashTool;

#[async_trait::async_trait]
impl Tool for BashTool {
    fn name(&self) -> &str {
        "bash"
    }

    fn description(&self) -> &str {
        "Run a shell command and return its output."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": { "type": "string", "description": "Shell command to run" },
                "timeout_ms": { "type": "integer", "description": "Timeout in milliseconds", "default": 120_000 },
            },
            "required": ["command"],
        })
    }

    fn default_permission(&self) -> ToolPermission {
        ToolPermission::Ask
    }

    async fn run(&self, args: Value, ctx: Arc<InvokeContext>) -> ToolEventStream {
        let command = args.get("command").and_then(Value::as_str).map(str::to_string);
        let timeout_ms = args.get("timeout_ms").and_then(Value::as_u64).unwrap_or(120_000);

        let s = stream! {
            let Some(command) = command else {
                yield ToolEvent::Done(Err(ToolError::InvalidArguments("missing `command`".to_string())));
                return;
            };

            let cwd = ctx.cwd.read().await.clone();
            let full_command = format!("{command}\necho \"{CWD_SENTINEL}$(pwd)\"");

            let mut child = match Command::new("bash")
                .arg("-c")
                .arg(&full_command)
                .current_dir(&cwd)
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .spawn()
            {
                Ok(c) => c,
                Err(e) => {
                    yield ToolEvent::Done(Err(ToolError::Io(e)));
                    return;
                }
            };

            let stdout = child.stdout.take().expect("piped stdout");
            let stderr = child.stderr.take().expect("piped stderr");
            let mut stdout_lines = BufReader::new(stdout).lines();
            let mut stderr_lines = BufReader::new(stderr).lines();

            let mut collected = String::new();
            let mut new_cwd: Option<String> = None;

            let run_future = async {
                loop {
                    tokio::select! {
                        line = stdout_lines.next_line() => {
                            match line {
                                Ok(Some(line)) => {
                                    if let Some(dir) = line.strip_prefix(CWD_SENTINEL) {
                                        new_cwd = Some(dir.to_string());
                                        continue;
                                    }
                                    collected.push_str(&line);
                                    collected.push('\n');
                                }
                                Ok(None) => break,
                                Err(e) => { warn!(error = %e, "error reading bash stdout"); break; }
                            }
                        }
                        line = stderr_lines.next_line() => {
                            if let Ok(Some(line)) = line {
                                collected.push_str(&line);
                                collected.push('\n');
                            }
                        }
                    }
                }
            };

            enum Outcome { Completed, TimedOut, Cancelled }

            let outcome = tokio::select! {
                biased;
                () = ctx.cancel_token.cancelled() => Outcome::Cancelled,
                result = tokio::time::timeout(std::time::Duration::from_millis(timeout_ms), run_future) => {
                    if result.is_err() { Outcome::TimedOut } else { Outcome::Completed }
                }
            };

            match outcome {
                Outcome::Cancelled => {
                    let _ = child.kill().await;
                    yield ToolEvent::Done(Err(ToolError::Cancelled));
                    return;
                }
                Outcome::TimedOut => {
                    let _ = child.kill().await;
                    yield ToolEvent::Done(Err(ToolError::Timeout(timeout_ms)));
                    return;
                }
                Outcome::Completed => {}
            }

            let _ = child.wait().await;

            if let Some(dir) = new_cwd {
                *ctx.cwd.write().await = std::path::PathBuf::from(dir);
            }

            yield ToolEvent::Done(Ok(truncate_output(collected)));
        };
        Box::pin(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    async fn run_and_collect(args: Value) -> ToolResult {
        let ctx = Arc::new(InvokeContext::new(std::env::temp_dir()));
        let mut stream = BashTool.run(args, ctx).await;
        let mut result = None;
        while let Some(event) = stream.next().await {
            if let ToolEvent::Done(r) = event {
                result = Some(r);
            }
        }
        result.expect("bash tool produced no Done event")
    }

    use crate::ToolResult;

    #[tokio::test]
    async fn runs_a_simple_command() {
        let output = run_and_collect(json!({ "command": "echo hello" })).await.unwrap();
        assert!(output.contains("hello"));
    }

    #[tokio::test]
    async fn missing_command_is_invalid_arguments() {
        let err = run_and_collect(json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[tokio::test]
    async fn cancel_token_stops_a_running_command() {
        let ctx = InvokeContext::new(std::env::temp_dir());
        ctx.cancel_token.cancel();
        let ctx = Arc::new(ctx);
        let mut stream = BashTool.run(json!({ "command": "sleep 5" }), ctx).await;
        let mut result = None;
        while let Some(event) = stream.next().await {
            if let ToolEvent::Done(r) = event {
                result = Some(r);
            }
        }
        assert!(matches!(result.unwrap().unwrap_err(), ToolError::Cancelled));
    }

    #[tokio::test]
    async fn cd_persists_across_invocations_via_shared_cwd() {
        let tmp = tempfile::tempdir().unwrap();
        let sub = tmp.path().join("sub");
        std::fs::create_dir(&sub).unwrap();
        let ctx = Arc::new(InvokeContext::new(tmp.path().to_path_buf()));

        let mut stream = BashTool.run(json!({ "command": "cd sub" }), Arc::clone(&ctx)).await;
        while let Some(event) = stream.next().await {
            if let ToolEvent::Done(r) = event {
                r.unwrap();
            }
        }

        let mut stream = BashTool.run(json!({ "command": "pwd" }), Arc::clone(&ctx)).await;
        let mut output = String::new();
        while let Some(event) = stream.next().await {
            if let ToolEvent::Done(Ok(r)) = event {
                output = r;
            }
        }
        assert!(output.trim_end().ends_with("sub"));
    }
}
