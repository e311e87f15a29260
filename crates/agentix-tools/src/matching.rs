use regex::Regex;

/// Match a tool name against one pattern: an exact string, a glob
/// (`*`/`?`), or a `re:`-prefixed regex.
///
/// Mirrors the three matching forms a Python predecessor of this
/// agent loop used for its tool allow/deny lists.
#[must_use]
pub fn name_matches(name: &str, pattern: &str) -> bool {
    if let Some(re_pattern) = pattern.strip_prefix("re:") {
        return Regex::new(re_pattern).is_ok_and(|re| re.is_match(name));
    }
    if pattern.contains('*') || pattern.contains('?') {
        return glob::Pattern::new(pattern).is_ok_and(|p| p.matches(name));
    }
    name == pattern
}

/// An enable/disable list governing which tools are exposed to the model.
///
/// At most one of `enabled` or `disabled` is meaningful at a time: if
/// `enabled` is non-empty it acts as an allowlist and `disabled` is
/// ignored; otherwise `disabled` acts as a denylist over everything
/// else.
#[derive(Debug, Clone, Default)]
pub struct ToolFilter {
    /// Allowlist patterns. Non-empty means "only these".
    pub enabled: Vec<String>,
    /// Denylist patterns, used when `enabled` is empty.
    pub disabled: Vec<String>,
}

impl ToolFilter {
    /// No filtering: every tool is available.
    #[must_use]
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Whether `name` passes this filter.
    #[must_use]
    pub fn allows(&self, name: &str) -> bool {
        if !self.enabled.is_empty() {
            return self.enabled.iter().any(|p| name_matches(name, p));
        }
        !self.disabled.iter().any(|p| name_matches(name, p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match() {
        assert!(name_matches("bash", "bash"));
        assert!(!name_matches("bash", "read_file"));
    }

    #[test]
    fn glob_match() {
        assert!(name_matches("mcp_server_read", "mcp_server_*"));
        assert!(!name_matches("bash", "mcp_server_*"));
    }

    #[test]
    fn regex_match() {
        assert!(name_matches("write_file", "re:^write_"));
        assert!(!name_matches("read_file", "re:^write_"));
    }

    #[test]
    fn filter_enabled_acts_as_allowlist() {
        let filter = ToolFilter { enabled: vec!["bash".to_string()], disabled: vec![] };
        assert!(filter.allows("bash"));
        assert!(!filter.allows("read_file"));
    }

    #[test]
    fn filter_disabled_acts_as_denylist_when_enabled_empty() {
        let filter = ToolFilter { enabled: vec![], disabled: vec!["bash".to_string()] };
        assert!(!filter.allows("bash"));
        assert!(filter.allows("read_file"));
    }

    #[test]
    fn filter_allow_all_allows_everything() {
        let filter = ToolFilter::allow_all();
        assert!(filter.allows("anything"));
    }
}
