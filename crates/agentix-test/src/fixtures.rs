//! Builders for common [`Message`]/[`AgentProfile`] shapes used across
//! the agent-loop test suites.

use agentix_config::{AgentProfile, AgentType};
use agentix_types::{Message, ToolCall};

/// A plain user message.
#[must_use]
pub fn test_user_message(content: impl Into<String>) -> Message {
    Message::user(content)
}

/// An assistant message carrying a single tool call, as it would look
/// once a streaming response has been fully assembled.
#[must_use]
pub fn test_assistant_tool_call(tool_call_id: impl Into<String>, tool_name: impl Into<String>, arguments: impl Into<String>) -> Message {
    let mut message = Message::assistant_empty();
    message.tool_calls.push(ToolCall {
        index: 0,
        id: tool_call_id.into(),
        name: tool_name.into(),
        arguments: arguments.into(),
    });
    message
}

/// A minimal custom agent profile, useful when a test needs a profile
/// that isn't one of the four builtins.
#[must_use]
pub fn test_agent_profile(name: impl Into<String>) -> AgentProfile {
    AgentProfile {
        name: name.into(),
        display_name: "Test Profile".to_string(),
        description: "A profile built for a test.".to_string(),
        agent_type: AgentType::Primary,
        system_prompt: "You are a test agent.".to_string(),
        enabled_tools: Vec::new(),
        disabled_tools: Vec::new(),
        overrides: Default::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assistant_tool_call_produces_one_call() {
        let message = test_assistant_tool_call("call_1", "bash", "{}");
        assert_eq!(message.tool_calls.len(), 1);
        assert_eq!(message.tool_calls[0].name, "bash");
    }

    #[test]
    fn test_agent_profile_uses_the_given_name() {
        let profile = test_agent_profile("custom");
        assert_eq!(profile.name, "custom");
    }
}
