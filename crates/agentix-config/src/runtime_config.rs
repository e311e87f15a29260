use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Permission state for one tool, as seen by the middleware pipeline
/// and approval gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolPermission {
    /// Run without asking.
    AlwaysAllow,
    /// Gate through approval.
    Ask,
}

/// The subset of configuration the required middlewares and the
/// approval gate read. Deliberately narrow — this is not a general
/// settings bag, just what [`crate::AgentProfile`] overlays onto and
/// the loop consults every turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Hard cap on turns in one loop invocation, enforced by the
    /// turn-limit middleware.
    pub max_turns: u32,
    /// Hard cap on cumulative spend, enforced by the cost-limit
    /// middleware.
    pub max_price_usd: f64,
    /// Price per 1,000 tokens, used to convert usage into spend for
    /// the cost-limit middleware.
    pub price_per_1k_tokens_usd: f64,
    /// Fraction of the model's context window that triggers
    /// auto-compaction.
    pub auto_compact_threshold: f64,
    /// Per-tool permission overrides. Tools absent here fall back to
    /// their own `default_permission`.
    #[serde(default)]
    pub tool_permissions: HashMap<String, ToolPermission>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_turns: 100,
            max_price_usd: 5.0,
            price_per_1k_tokens_usd: 0.01,
            auto_compact_threshold: 0.85,
            tool_permissions: HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_has_sane_bounds() {
        let config = RuntimeConfig::default();
        assert!(config.max_turns > 0);
        assert!(config.auto_compact_threshold > 0.0 && config.auto_compact_threshold < 1.0);
    }
}
