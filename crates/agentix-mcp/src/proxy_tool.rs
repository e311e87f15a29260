use std::sync::Arc;

use async_stream::stream;
use rmcp::model::CallToolRequestParams as CallToolRequestParam;
use rmcp::service::{Peer, RoleClient};
use serde_json::Value;
use tracing::warn;

use agentix_tools::{InvokeContext, Tool, ToolError, ToolEvent, ToolEventStream, ToolPermission};

/// A [`Tool`] backed by one remote tool on a connected MCP server.
///
/// Exposed to the model under `<alias>_<remote_name>` so a host can
/// run several MCP servers without their tool names colliding.
pub struct McpProxyTool {
    exposed_name: String,
    remote_name: String,
    description: String,
    parameters: Value,
    peer: Arc<Peer<RoleClient>>,
    call_timeout: std::time::Duration,
}

impl McpProxyTool {
    /// Build a proxy tool for one remote tool on an already-connected
    /// server.
    #[must_use]
    pub fn new(
        alias: &str,
        remote_name: String,
        description: String,
        parameters: Value,
        peer: Arc<Peer<RoleClient>>,
        call_timeout: std::time::Duration,
    ) -> Self {
        Self {
            exposed_name: format!("{alias}_{remote_name}"),
            remote_name,
            description,
            parameters,
            peer,
            call_timeout,
        }
    }
}

#[async_trait::async_trait]
impl Tool for McpProxyTool {
    fn name(&self) -> &str {
        &self.exposed_name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> Value {
        self.parameters.clone()
    }

    fn default_permission(&self) -> ToolPermission {
        ToolPermission::Ask
    }

    async fn run(&self, args: Value, _ctx: Arc<InvokeContext>) -> ToolEventStream {
        let remote_name = self.remote_name.clone();
        let peer = Arc::clone(&self.peer);
        let timeout = self.call_timeout;
        let s = stream! {
            let arguments = args.as_object().cloned();
            let call = peer.call_tool(CallToolRequestParam {
                meta: None,
                name: remote_name.clone().into(),
                arguments,
                task: None,
            });
            let result = match tokio::time::timeout(timeout, call).await {
                Ok(Ok(result)) => result,
                Ok(Err(e)) => {
                    yield ToolEvent::Done(Err(ToolError::ExecutionFailed(format!(
                        "mcp tool '{remote_name}' failed: {e}"
                    ))));
                    return;
                }
                Err(_) => {
                    yield ToolEvent::Done(Err(ToolError::Timeout(timeout.as_millis() as u64)));
                    return;
                }
            };

            let mut text = String::new();
            for content in &result.content {
                if let Some(t) = content.as_text() {
                    text.push_str(&t.text);
                    text.push('\n');
                } else {
                    warn!(tool = %remote_name, "mcp result contained non-text content, skipping");
                }
            }
            if result.is_error.unwrap_or(false) {
                yield ToolEvent::Done(Err(ToolError::ExecutionFailed(text)));
            } else {
                yield ToolEvent::Done(Ok(text));
            }
        };
        Box::pin(s)
    }
}
