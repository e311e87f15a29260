use std::path::Path;

use tracing::warn;

use crate::error::ConfigError;
use crate::profile::{AgentProfile, AgentType};

/// Discovers and cycles through available [`AgentProfile`]s.
///
/// Precedence on discovery mirrors a predecessor Python
/// implementation's tool/agent managers: builtins first, then any
/// project-local TOML profile files, with a later file's name
/// overriding an earlier definition (logged, not silently dropped).
pub struct AgentRegistry {
    profiles: Vec<AgentProfile>,
    disabled: Vec<String>,
}

impl AgentRegistry {
    /// A registry with only the four builtin profiles.
    #[must_use]
    pub fn with_builtins() -> Self {
        Self { profiles: AgentProfile::builtins(), disabled: Vec::new() }
    }

    /// Discover additional profiles from `*.toml` files directly under
    /// `project_dir`, overriding any builtin of the same name.
    ///
    /// A file that fails to parse is logged and skipped; it does not
    /// abort discovery of the rest.
    pub fn discover_project_profiles(&mut self, project_dir: &Path) -> Result<(), ConfigError> {
        let entries = match std::fs::read_dir(project_dir) {
            Ok(entries) => entries,
            Err(_) => return Ok(()),
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("toml") {
                continue;
            }
            let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::Read {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
            let profile: AgentProfile = toml::from_str(&content).map_err(|e| ConfigError::Parse {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
            if let Some(existing) = self.profiles.iter_mut().find(|p| p.name == profile.name) {
                warn!(name = %profile.name, path = %path.display(), "project profile overrides an existing one");
                *existing = profile;
            } else {
                self.profiles.push(profile);
            }
        }
        Ok(())
    }

    /// Disable a set of profiles by name; they're excluded from
    /// [`Self::available`] and [`Self::order`] but can still be looked
    /// up directly via [`Self::get`].
    pub fn set_disabled(&mut self, names: Vec<String>) {
        self.disabled = names;
    }

    /// Look up a profile by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&AgentProfile> {
        self.profiles.iter().find(|p| p.name == name)
    }

    /// Profiles available for user-facing selection: primary profiles
    /// only, honoring `set_disabled`. Sub-agent profiles (spawned via
    /// the `task` tool) are never offered here — use [`Self::get`] to
    /// resolve one by name directly.
    #[must_use]
    pub fn available(&self) -> Vec<&AgentProfile> {
        self.profiles
            .iter()
            .filter(|p| p.agent_type == AgentType::Primary && !self.disabled.contains(&p.name))
            .collect()
    }

    /// A fixed display order: the four builtins first (in their
    /// canonical order), then any custom profiles sorted by name.
    #[must_use]
    pub fn order(&self) -> Vec<String> {
        const BUILTIN_ORDER: [&str; 4] = ["default", "plan", "accept_edits", "auto_approve"];
        let available = self.available();
        let mut ordered: Vec<String> = BUILTIN_ORDER
            .iter()
            .filter(|name| available.iter().any(|p| &p.name == *name))
            .map(|s| (*s).to_string())
            .collect();
        let mut custom: Vec<String> = available
            .iter()
            .map(|p| p.name.clone())
            .filter(|name| !BUILTIN_ORDER.contains(&name.as_str()))
            .collect();
        custom.sort();
        ordered.extend(custom);
        ordered
    }

    /// The profile that follows `current` in [`Self::order`], wrapping
    /// around at the end.
    #[must_use]
    pub fn next(&self, current: &str) -> Option<&AgentProfile> {
        let order = self.order();
        let position = order.iter().position(|name| name == current)?;
        let next_name = &order[(position + 1) % order.len()];
        self.get(next_name)
    }
}
