use std::sync::Arc;

use rmcp::model::ListToolsResult;
use rmcp::service::{Peer, RoleClient, ServiceExt};
use rmcp::transport::TokioChildProcess;
use tokio::process::Command;
use tracing::{info, warn};

use agentix_tools::Tool;

use crate::config::{McpServerConfig, McpTransport};
use crate::error::McpError;
use crate::proxy_tool::McpProxyTool;

/// Connects to every configured MCP server and exposes their remote
/// tools as [`agentix_tools::Tool`] instances.
///
/// Mirrors the "merge two layers" shape of the tool registry itself:
/// builtins come from [`agentix_tools::ToolRegistry::with_builtins`],
/// MCP-discovered tools come from here, and a host combines both into
/// one registry before starting the loop.
pub struct McpRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl McpRegistry {
    /// Connect to every server in `configs`, discover their tools, and
    /// build one proxy [`Tool`] per remote tool.
    ///
    /// A server that fails to connect or list tools is logged and
    /// skipped rather than failing discovery for every other server.
    pub async fn discover(configs: &[McpServerConfig]) -> Self {
        let mut tools: Vec<Arc<dyn Tool>> = Vec::new();
        for config in configs {
            match Self::discover_one(config).await {
                Ok(mut server_tools) => tools.append(&mut server_tools),
                Err(e) => warn!(alias = %config.alias, error = %e, "skipping MCP server"),
            }
        }
        Self { tools }
    }

    async fn discover_one(config: &McpServerConfig) -> Result<Vec<Arc<dyn Tool>>, McpError> {
        let peer = Arc::new(Self::connect(config).await?);
        let ListToolsResult { tools, .. } =
            peer.list_tools(Default::default()).await.map_err(|e| McpError::ListTools {
                alias: config.alias.clone(),
                reason: e.to_string(),
            })?;

        info!(alias = %config.alias, count = tools.len(), "discovered MCP tools");

        Ok(tools
            .into_iter()
            .map(|t| {
                let schema = serde_json::to_value(&*t.input_schema).unwrap_or(serde_json::json!({}));
                Arc::new(McpProxyTool::new(
                    &config.alias,
                    t.name.to_string(),
                    t.description.map(|d| d.to_string()).unwrap_or_default(),
                    schema,
                    Arc::clone(&peer),
                    config.call_timeout,
                )) as Arc<dyn Tool>
            })
            .collect())
    }

    async fn connect(config: &McpServerConfig) -> Result<Peer<RoleClient>, McpError> {
        match &config.transport {
            McpTransport::Stdio { command, args, env } => {
                let mut cmd = Command::new(command);
                cmd.args(args);
                for (k, v) in env {
                    cmd.env(k, v);
                }
                let transport = TokioChildProcess::new(cmd).map_err(|e| McpError::Connect {
                    alias: config.alias.clone(),
                    reason: e.to_string(),
                })?;
                let service = ().serve(transport).await.map_err(|e| McpError::Connect {
                    alias: config.alias.clone(),
                    reason: e.to_string(),
                })?;
                Ok(service.peer().clone())
            }
            McpTransport::Http { url, .. } => Err(McpError::Connect {
                alias: config.alias.clone(),
                reason: format!(
                    "HTTP MCP transport not wired for '{url}' — only stdio servers are connected in this build"
                ),
            }),
        }
    }

    /// All discovered proxy tools.
    #[must_use]
    pub fn into_tools(self) -> Vec<Arc<dyn Tool>> {
        self.tools
    }
}
