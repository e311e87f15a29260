use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How to reach an MCP server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "transport", rename_all = "snake_case")]
pub enum McpTransport {
    /// Spawn a child process and speak MCP over its stdio.
    Stdio {
        /// Executable to launch.
        command: String,
        /// Arguments to pass.
        #[serde(default)]
        args: Vec<String>,
        /// Extra environment variables.
        #[serde(default)]
        env: HashMap<String, String>,
    },
    /// Connect to an already-running server over HTTP.
    Http {
        /// Base URL of the server.
        url: String,
        /// Bearer token, if the server requires one.
        #[serde(default)]
        bearer_token: Option<String>,
    },
}

/// One configured MCP server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpServerConfig {
    /// Short name this server's tools are namespaced under
    /// (`<alias>_<remote-name>`).
    pub alias: String,
    /// Transport to use.
    #[serde(flatten)]
    pub transport: McpTransport,
    /// Timeout for individual tool calls.
    #[serde(default = "default_call_timeout", with = "duration_secs")]
    pub call_timeout: Duration,
}

fn default_call_timeout() -> Duration {
    Duration::from_secs(60)
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(d)?))
    }
}
