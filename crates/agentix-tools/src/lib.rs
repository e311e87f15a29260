#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
//! The tool contract, registry, and built-in coding tools for the
//! Agentix agent loop.

mod ask_user_question;
mod bash;
mod edit_file;
mod glob_tool;
mod matching;
mod read_file;
pub mod subagent;
mod task;
mod write_file;

pub use ask_user_question::AskUserQuestionTool;
pub use bash::BashTool;
pub use edit_file::EditFileTool;
pub use glob_tool::GlobTool;
pub use matching::{name_matches, ToolFilter};
pub use read_file::ReadFileTool;
pub use subagent::{SubAgentRequest, SubAgentResult, SubAgentSpawnError, SubAgentSpawner};
pub use task::TaskTool;
pub use write_file::WriteFileTool;

use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures::Stream;
use serde_json::Value;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

/// Maximum tool output size in characters before truncation.
const MAX_OUTPUT_CHARS: usize = 30_000;

/// Whether a tool call requires explicit user confirmation before it runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolPermission {
    /// Run immediately, without asking.
    AlwaysAllow,
    /// Gate through the approval flow.
    Ask,
}

/// One increment of a running tool invocation.
#[derive(Debug)]
pub enum ToolEvent {
    /// Incremental progress output, surfaced to the user while the
    /// tool is still running.
    Progress(String),
    /// The tool finished.
    Done(ToolResult),
}

/// A boxed stream of tool events.
pub type ToolEventStream = Pin<Box<dyn Stream<Item = ToolEvent> + Send>>;

/// Tool execution errors.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// The arguments didn't match the tool's schema.
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),
    /// The tool ran but failed.
    #[error("execution failed: {0}")]
    ExecutionFailed(String),
    /// A referenced path does not exist.
    #[error("path not found: {0}")]
    PathNotFound(String),
    /// The tool exceeded its time budget.
    #[error("timed out after {0}ms")]
    Timeout(u64),
    /// The host cancelled the run while the tool was in flight.
    #[error("cancelled")]
    Cancelled,
}

/// Result of a tool invocation.
pub type ToolResult = Result<String, ToolError>;

/// A host callback that presents a free-text question (with optional
/// suggested answers) to the user and returns their reply.
pub type AskUserCallback =
    Arc<dyn Fn(String, Vec<String>) -> Pin<Box<dyn Future<Output = String> + Send>> + Send + Sync>;

/// Context shared by every tool invocation within one agent loop.
pub struct InvokeContext {
    /// Workspace root new relative paths resolve against.
    pub workspace_root: PathBuf,
    /// Current working directory, shared and mutable across `bash`
    /// invocations within a session (a `cd` in one call affects the next).
    pub cwd: Arc<RwLock<PathBuf>>,
    /// Host callback for `ask_user_question`. `None` means the host
    /// has no interactive surface; the tool then fails rather than
    /// hanging.
    pub ask_user: Option<AskUserCallback>,
    /// Sub-agent spawner for the `task` tool, set by the runtime at
    /// the start of each turn and cleared (or just left unset) when
    /// sub-agents aren't supported.
    subagent_spawner: RwLock<Option<Arc<dyn subagent::SubAgentSpawner>>>,
    /// Level-triggered cancellation signal. A host cancels a running
    /// loop by calling `cancel()` on its clone of this token; tools
    /// that run for a while (`bash`) observe it between checkpoints
    /// and unwind early rather than polling a flag.
    pub cancel_token: CancellationToken,
}

impl InvokeContext {
    /// Build a context rooted at `workspace_root`, with a fresh,
    /// loop-owned cancellation token.
    #[must_use]
    pub fn new(workspace_root: PathBuf) -> Self {
        let cwd = Arc::new(RwLock::new(workspace_root.clone()));
        Self {
            workspace_root,
            cwd,
            ask_user: None,
            subagent_spawner: RwLock::new(None),
            cancel_token: CancellationToken::new(),
        }
    }

    /// Build a context that shares its `cwd` with another (used for a
    /// sub-agent session that should inherit the parent's directory).
    #[must_use]
    pub fn with_shared_cwd(workspace_root: PathBuf, cwd: Arc<RwLock<PathBuf>>) -> Self {
        Self {
            workspace_root,
            cwd,
            ask_user: None,
            subagent_spawner: RwLock::new(None),
            cancel_token: CancellationToken::new(),
        }
    }

    /// Attach a host callback for `ask_user_question`.
    #[must_use]
    pub fn with_ask_user(mut self, callback: AskUserCallback) -> Self {
        self.ask_user = Some(callback);
        self
    }

    /// Replace the default, loop-owned cancellation token with one a
    /// host holds a clone of, so it can cancel this loop from outside.
    #[must_use]
    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel_token = token;
        self
    }

    /// Set (or clear) the sub-agent spawner the `task` tool will use.
    pub async fn set_subagent_spawner(&self, spawner: Option<Arc<dyn subagent::SubAgentSpawner>>) {
        *self.subagent_spawner.write().await = spawner;
    }

    /// The currently installed sub-agent spawner, if any.
    pub async fn subagent_spawner(&self) -> Option<Arc<dyn subagent::SubAgentSpawner>> {
        self.subagent_spawner.read().await.clone()
    }
}

/// A tool the agent loop can call.
///
/// `run` returns a stream rather than a single future so long-running
/// tools (`bash`, MCP proxies) can surface progress before they
/// complete; short tools just yield a single [`ToolEvent::Done`].
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name as presented to the model. Built-in tool names never
    /// contain a colon; MCP proxy tools use `<server>_<name>`.
    fn name(&self) -> &str;

    /// Human-readable description for the model.
    fn description(&self) -> &str;

    /// JSON schema for the tool's arguments.
    fn parameters(&self) -> Value;

    /// The permission level a fresh instance of this tool starts with.
    fn default_permission(&self) -> ToolPermission {
        ToolPermission::Ask
    }

    /// Run the tool.
    async fn run(&self, args: Value, ctx: Arc<InvokeContext>) -> ToolEventStream;
}

/// Registry of available tools, keyed by name.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    permissions: HashMap<String, ToolPermission>,
}

impl ToolRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with every built-in tool registered.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(ReadFileTool));
        registry.register(Arc::new(WriteFileTool));
        registry.register(Arc::new(EditFileTool));
        registry.register(Arc::new(GlobTool));
        registry.register(Arc::new(BashTool));
        registry.register(Arc::new(AskUserQuestionTool));
        registry
    }

    /// Register a tool, taking its `default_permission` as its
    /// starting permission.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let perm = tool.default_permission();
        self.permissions.insert(tool.name().to_string(), perm);
        self.tools.insert(tool.name().to_string(), tool);
    }

    /// Look up a tool by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Current permission for a tool, if registered.
    #[must_use]
    pub fn permission(&self, name: &str) -> Option<ToolPermission> {
        self.permissions.get(name).copied()
    }

    /// Flip a tool's permission to `AlwaysAllow`. Used by the approval
    /// gate to implement "allow always".
    pub fn set_always_allow(&mut self, name: &str) {
        self.permissions.insert(name.to_string(), ToolPermission::AlwaysAllow);
    }

    /// Tool names filtered by an enable/disable list, per
    /// [`ToolFilter`].
    #[must_use]
    pub fn available(&self, filter: &ToolFilter) -> Vec<String> {
        self.tools.keys().filter(|name| filter.allows(name)).cloned().collect()
    }

    /// Validate `args` against `name`'s declared JSON schema.
    ///
    /// Returns `Ok(())` if the tool is unregistered (the caller
    /// reports unknown-tool separately) or if the tool's own schema
    /// fails to compile — a malformed schema shouldn't block every
    /// call to that tool, it should just skip validation for it.
    pub fn validate_arguments(&self, name: &str, args: &Value) -> Result<(), ToolError> {
        let Some(tool) = self.tools.get(name) else {
            return Ok(());
        };
        let schema = tool.parameters();
        let validator = match jsonschema::validator_for(&schema) {
            Ok(validator) => validator,
            Err(_) => return Ok(()),
        };
        let errors: Vec<String> = validator.iter_errors(args).map(|e| e.to_string()).collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ToolError::InvalidArguments(errors.join("; ")))
        }
    }

    /// JSON-schema tool definitions for every registered tool, in the
    /// shape a [`Backend`](agentix_llm::Backend) request expects.
    #[must_use]
    pub fn all_definitions(&self) -> Vec<Value> {
        self.tools
            .values()
            .map(|t| {
                serde_json::json!({
                    "type": "function",
                    "function": {
                        "name": t.name(),
                        "description": t.description(),
                        "parameters": t.parameters(),
                    }
                })
            })
            .collect()
    }
}

/// Truncate output to stay within LLM context limits.
#[must_use]
pub fn truncate_output(output: String) -> String {
    if output.len() <= MAX_OUTPUT_CHARS {
        return output;
    }
    let mut truncated = output[..MAX_OUTPUT_CHARS].to_string();
    truncated.push_str("\n\n... (output truncated — exceeded 30000 character limit)");
    truncated
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_builtins_registers_expected_tools() {
        let registry = ToolRegistry::with_builtins();
        for name in ["read_file", "write_file", "edit_file", "glob", "bash", "ask_user_question"] {
            assert!(registry.get(name).is_some(), "missing tool {name}");
        }
    }

    #[test]
    fn builtin_names_never_contain_a_colon() {
        let registry = ToolRegistry::with_builtins();
        for def in registry.all_definitions() {
            let name = def["function"]["name"].as_str().unwrap();
            assert!(!name.contains(':'));
        }
    }

    #[test]
    fn set_always_allow_updates_permission() {
        let mut registry = ToolRegistry::with_builtins();
        assert_eq!(registry.permission("bash"), Some(ToolPermission::Ask));
        registry.set_always_allow("bash");
        assert_eq!(registry.permission("bash"), Some(ToolPermission::AlwaysAllow));
    }

    #[test]
    fn truncate_output_leaves_small_output_untouched() {
        let small = "hello".to_string();
        assert_eq!(truncate_output(small.clone()), small);
    }

    #[test]
    fn validate_arguments_rejects_missing_required_field() {
        let registry = ToolRegistry::with_builtins();
        let err = registry.validate_arguments("bash", &serde_json::json!({})).unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[test]
    fn validate_arguments_accepts_well_formed_args() {
        let registry = ToolRegistry::with_builtins();
        registry.validate_arguments("bash", &serde_json::json!({ "command": "echo hi" })).unwrap();
    }

    #[test]
    fn validate_arguments_skips_unregistered_tools() {
        let registry = ToolRegistry::with_builtins();
        registry.validate_arguments("does_not_exist", &serde_json::json!({})).unwrap();
    }

    #[test]
    fn truncate_output_truncates_large_output() {
        let large = "x".repeat(40_000);
        let result = truncate_output(large);
        assert!(result.len() < 40_000);
        assert!(result.contains("output truncated"));
    }
}
