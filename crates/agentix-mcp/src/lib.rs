#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
//! MCP (Model Context Protocol) server discovery and proxy-tool
//! registration for the Agentix agent loop.
//!
//! Each configured MCP server is connected at startup; every remote
//! tool it exposes is registered as one [`agentix_tools::Tool`] named
//! `<server-alias>_<remote-name>`, so the agent loop's tool registry
//! never needs to know MCP exists.

mod config;
mod error;
mod proxy_tool;
mod registry;

pub use config::{McpServerConfig, McpTransport};
pub use error::McpError;
pub use proxy_tool::McpProxyTool;
pub use registry::McpRegistry;
