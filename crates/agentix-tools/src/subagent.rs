use async_trait::async_trait;

/// A request to run a sub-agent to completion.
#[derive(Debug, Clone)]
pub struct SubAgentRequest {
    /// Name of the sub-agent profile to run it as (e.g. `"explore"`).
    pub target_profile: String,
    /// Short description of the sub-agent's task, shown to the user
    /// while it runs.
    pub description: String,
    /// The prompt the sub-agent is given as its first user message.
    pub prompt: String,
}

/// The outcome of a completed sub-agent run.
#[derive(Debug, Clone)]
pub struct SubAgentResult {
    /// Whether the sub-agent reached a natural end-of-turn (as
    /// opposed to erroring, timing out, or being cancelled).
    pub completed: bool,
    /// The sub-agent's final assistant text, or a description of why
    /// there isn't one.
    pub response: String,
    /// How many turns the sub-agent used.
    pub turns_used: u32,
}

/// Why a sub-agent request couldn't be run.
///
/// Distinguishes "the request itself was invalid" (unknown profile,
/// wrong profile type — the `task` tool maps these to
/// `ToolError::InvalidArguments`, never entering `run`) from "the
/// sub-agent ran but the host failed to execute it" (maps to
/// `ToolError::ExecutionFailed`).
#[derive(Debug, Clone)]
pub enum SubAgentSpawnError {
    /// No profile with this name is registered.
    UnknownProfile(String),
    /// The named profile exists but isn't a sub-agent profile —
    /// primary (user-facing) profiles aren't spawnable via `task`.
    WrongAgentType(String),
    /// The sub-agent session itself failed to start or run.
    Failed(String),
}

impl std::fmt::Display for SubAgentSpawnError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownProfile(name) => write!(f, "unknown sub-agent profile: {name}"),
            Self::WrongAgentType(name) => write!(f, "profile `{name}` is not a sub-agent profile"),
            Self::Failed(reason) => write!(f, "{reason}"),
        }
    }
}

impl std::error::Error for SubAgentSpawnError {}

/// Spawns a sub-agent and runs it to completion.
///
/// Defined here (not in `agentix-runtime`, which is what actually
/// implements it) so the `task` tool can depend on the trait without
/// `agentix-tools` depending on `agentix-runtime` — the same
/// cycle-breaking shape `ask_user`'s callback uses for user
/// interaction.
#[async_trait]
pub trait SubAgentSpawner: Send + Sync {
    /// Run `request` as a fresh sub-agent session and return its result.
    async fn spawn(&self, request: SubAgentRequest) -> Result<SubAgentResult, SubAgentSpawnError>;
}
