use thiserror::Error;

/// Errors from MCP server discovery and tool invocation.
#[derive(Debug, Error)]
pub enum McpError {
    /// Failed to start or connect to a configured server.
    #[error("failed to connect to MCP server '{alias}': {reason}")]
    Connect {
        /// Server alias from config.
        alias: String,
        /// Underlying reason.
        reason: String,
    },
    /// Listing the server's tools failed.
    #[error("failed to list tools for MCP server '{alias}': {reason}")]
    ListTools {
        /// Server alias from config.
        alias: String,
        /// Underlying reason.
        reason: String,
    },
    /// A proxied tool call failed.
    #[error("MCP tool call '{tool}' on server '{alias}' failed: {reason}")]
    CallFailed {
        /// Server alias from config.
        alias: String,
        /// Remote tool name.
        tool: String,
        /// Underlying reason.
        reason: String,
    },
}
