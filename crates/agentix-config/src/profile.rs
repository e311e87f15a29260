use serde::{Deserialize, Serialize};

use crate::runtime_config::RuntimeConfig;

/// A profile's role in the agent loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentType {
    /// The user-facing top-level agent for a session.
    Primary,
    /// Spawnable via the `task` tool, never selected directly by a user.
    Subagent,
}

/// A named bundle of loop behavior: a system prompt, which tools are
/// exposed, and config overlays (e.g. a stricter `max_turns`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentProfile {
    /// Unique name, used for lookup and `task` tool routing.
    pub name: String,
    /// Name shown to the user.
    pub display_name: String,
    /// What this profile is for.
    pub description: String,
    /// Primary or sub-agent.
    pub agent_type: AgentType,
    /// System prompt prefix for this profile.
    pub system_prompt: String,
    /// Tool name allowlist; empty means "no restriction beyond `disabled_tools`".
    #[serde(default)]
    pub enabled_tools: Vec<String>,
    /// Tool name denylist, used only when `enabled_tools` is empty.
    #[serde(default)]
    pub disabled_tools: Vec<String>,
    /// Fields to overlay onto the base [`RuntimeConfig`] while this
    /// profile is active. `None` means "inherit the base value".
    #[serde(default)]
    pub overrides: RuntimeConfigOverrides,
}

/// Partial [`RuntimeConfig`], applied over a base config by
/// [`AgentProfile::apply_to_config`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeConfigOverrides {
    /// Overlay for [`RuntimeConfig::max_turns`].
    pub max_turns: Option<u32>,
    /// Overlay for [`RuntimeConfig::max_price_usd`].
    pub max_price_usd: Option<f64>,
    /// Overlay for [`RuntimeConfig::auto_compact_threshold`].
    pub auto_compact_threshold: Option<f64>,
}

impl AgentProfile {
    /// The four builtin profiles every host gets without any
    /// discovery, named and ordered the way a fixed menu of modes
    /// would present them.
    #[must_use]
    pub fn builtins() -> Vec<AgentProfile> {
        vec![
            AgentProfile {
                name: "default".to_string(),
                display_name: "Default".to_string(),
                description: "General-purpose coding agent.".to_string(),
                agent_type: AgentType::Primary,
                system_prompt: "You are a helpful coding assistant.".to_string(),
                enabled_tools: Vec::new(),
                disabled_tools: Vec::new(),
                overrides: RuntimeConfigOverrides::default(),
            },
            AgentProfile {
                name: "plan".to_string(),
                display_name: "Plan".to_string(),
                description: "Read-only planning mode; no file edits.".to_string(),
                agent_type: AgentType::Primary,
                system_prompt: "You are in plan mode. Investigate and propose a plan; do not edit files."
                    .to_string(),
                enabled_tools: Vec::new(),
                disabled_tools: vec!["write_file".to_string(), "edit_file".to_string()],
                overrides: RuntimeConfigOverrides::default(),
            },
            AgentProfile {
                name: "accept_edits".to_string(),
                display_name: "Accept Edits".to_string(),
                description: "Like Default, but file edits never require approval.".to_string(),
                agent_type: AgentType::Primary,
                system_prompt: "You are a helpful coding assistant.".to_string(),
                enabled_tools: Vec::new(),
                disabled_tools: Vec::new(),
                overrides: RuntimeConfigOverrides::default(),
            },
            AgentProfile {
                name: "auto_approve".to_string(),
                display_name: "Auto Approve".to_string(),
                description: "Nothing requires approval. Use with caution.".to_string(),
                agent_type: AgentType::Primary,
                system_prompt: "You are a helpful coding assistant.".to_string(),
                enabled_tools: Vec::new(),
                disabled_tools: Vec::new(),
                overrides: RuntimeConfigOverrides::default(),
            },
            AgentProfile {
                name: "explore".to_string(),
                display_name: "Explore".to_string(),
                description: "Read-only sub-agent for focused investigation, spawned via the \
                    `task` tool rather than selected by a user."
                    .to_string(),
                agent_type: AgentType::Subagent,
                system_prompt: "You are a focused, read-only research sub-agent. Investigate and \
                    report back; do not edit files."
                    .to_string(),
                enabled_tools: Vec::new(),
                disabled_tools: vec!["write_file".to_string(), "edit_file".to_string()],
                overrides: RuntimeConfigOverrides { max_turns: Some(20), ..RuntimeConfigOverrides::default() },
            },
        ]
    }

    /// Apply this profile's overrides onto a base config, returning a
    /// new, effective config. The base is never mutated.
    #[must_use]
    pub fn apply_to_config(&self, base: &RuntimeConfig) -> RuntimeConfig {
        let mut effective = base.clone();
        if let Some(v) = self.overrides.max_turns {
            effective.max_turns = v;
        }
        if let Some(v) = self.overrides.max_price_usd {
            effective.max_price_usd = v;
        }
        if let Some(v) = self.overrides.auto_compact_threshold {
            effective.auto_compact_threshold = v;
        }
        effective
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_cover_the_five_fixed_names() {
        let names: Vec<_> = AgentProfile::builtins().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["default", "plan", "accept_edits", "auto_approve", "explore"]);
    }

    #[test]
    fn explore_is_the_only_subagent_profile() {
        let subagents: Vec<_> = AgentProfile::builtins()
            .into_iter()
            .filter(|p| p.agent_type == AgentType::Subagent)
            .map(|p| p.name)
            .collect();
        assert_eq!(subagents, vec!["explore"]);
    }

    #[test]
    fn apply_to_config_overlays_only_set_fields() {
        let base = RuntimeConfig { max_turns: 50, ..RuntimeConfig::default() };
        let mut profile = AgentProfile::builtins().remove(0);
        profile.overrides.max_turns = Some(10);
        let effective = profile.apply_to_config(&base);
        assert_eq!(effective.max_turns, 10);
        assert_eq!(effective.max_price_usd, base.max_price_usd);
    }

    #[test]
    fn plan_profile_disables_write_tools() {
        let plan = AgentProfile::builtins().into_iter().find(|p| p.name == "plan").unwrap();
        assert!(plan.disabled_tools.contains(&"write_file".to_string()));
    }
}
