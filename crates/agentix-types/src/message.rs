use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Who produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    /// A fixed instruction preceding the conversation.
    System,
    /// Input from the end user.
    User,
    /// Output produced by the model.
    Assistant,
    /// The result of invoking a tool the assistant requested.
    Tool,
}

/// A single tool invocation requested by the assistant.
///
/// `arguments` accumulates as a raw JSON string while a streaming
/// response is in flight; it is only parsed once the turn is final.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Position among the tool calls in this turn. Streaming backends
    /// deliver tool call fragments out of order with respect to other
    /// fields, so merging keys on this index rather than array position.
    pub index: usize,
    /// Opaque id the backend assigned this call; echoed back in the
    /// matching tool-result message.
    pub id: String,
    /// Tool name.
    pub name: String,
    /// Raw JSON arguments, accumulated across streaming deltas.
    pub arguments: String,
}

/// One entry in the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Message author.
    pub role: MessageRole,
    /// Text content. Empty string for a pure tool-call assistant
    /// message with no accompanying text.
    #[serde(default)]
    pub content: String,
    /// Chain-of-thought / reasoning content, when the backend exposes
    /// it. Kept separate from `content` so callers can choose whether
    /// to render it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_content: Option<String>,
    /// Tool calls requested by an assistant message. Empty for
    /// non-assistant roles.
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
    /// Identity of this message, used by the middleware pipeline and
    /// message store to address individual turns. Present for every
    /// role except `Tool`, whose identity is its `tool_call_id`
    /// instead.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<Uuid>,
    /// For `Tool` role messages: the id of the `ToolCall` this is a
    /// result for.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// For `Tool` role messages: the name of the tool that produced
    /// this result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Message {
    /// Build a system message.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
            reasoning_content: None,
            tool_calls: Vec::new(),
            message_id: Some(Uuid::new_v4()),
            tool_call_id: None,
            name: None,
        }
    }

    /// Build a user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
            reasoning_content: None,
            tool_calls: Vec::new(),
            message_id: Some(Uuid::new_v4()),
            tool_call_id: None,
            name: None,
        }
    }

    /// Build an assistant message with plain text content.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
            reasoning_content: None,
            tool_calls: Vec::new(),
            message_id: Some(Uuid::new_v4()),
            tool_call_id: None,
            name: None,
        }
    }

    /// Build an empty assistant message, the seed a streaming turn
    /// accumulates deltas into.
    #[must_use]
    pub fn assistant_empty() -> Self {
        Self::assistant(String::new())
    }

    /// Build a tool-result message. Tool-role messages never carry a
    /// `message_id` — they're addressed by `tool_call_id` instead.
    #[must_use]
    pub fn tool_result(tool_call_id: impl Into<String>, name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Tool,
            content: content.into(),
            reasoning_content: None,
            tool_calls: Vec::new(),
            message_id: None,
            tool_call_id: Some(tool_call_id.into()),
            name: Some(name.into()),
        }
    }

    /// Merge a streaming delta into this message, in place.
    ///
    /// `content`, `reasoning_content`, and each tool call's
    /// `arguments` are concatenated; `tool_calls` are merged by
    /// `index` (a new index appends, an existing index's `arguments`
    /// are appended to). `message_id` is left untouched — it is set
    /// once, on the message the delta stream accumulates into, and a
    /// delta never carries one of its own.
    pub fn merge_delta(&mut self, delta: &Message) {
        self.content.push_str(&delta.content);
        if let Some(reasoning) = &delta.reasoning_content {
            self.reasoning_content
                .get_or_insert_with(String::new)
                .push_str(reasoning);
        }
        for delta_call in &delta.tool_calls {
            match self.tool_calls.iter_mut().find(|c| c.index == delta_call.index) {
                Some(existing) => {
                    if !delta_call.id.is_empty() {
                        existing.id = delta_call.id.clone();
                    }
                    if !delta_call.name.is_empty() {
                        existing.name.push_str(&delta_call.name);
                    }
                    existing.arguments.push_str(&delta_call.arguments);
                }
                None => self.tool_calls.push(delta_call.clone()),
            }
        }
    }

    /// True if this message carries no text, no reasoning, and no
    /// tool calls — the state a fresh streaming accumulator starts
    /// in.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.content.is_empty() && self.reasoning_content.is_none() && self.tool_calls.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_and_assistant_get_fresh_message_ids() {
        let a = Message::user("hi");
        let b = Message::user("hi");
        assert!(a.message_id.is_some());
        assert_ne!(a.message_id, None);
        assert_ne!(a.message_id, b.message_id);
    }

    #[test]
    fn tool_result_has_no_message_id() {
        let m = Message::tool_result("call_1", "bash", "ok");
        assert_eq!(m.message_id, None);
        assert_eq!(m.tool_call_id.as_deref(), Some("call_1"));
    }

    #[test]
    fn merge_delta_concatenates_content() {
        let mut acc = Message::assistant_empty();
        acc.merge_delta(&Message::assistant("Hel"));
        acc.merge_delta(&Message::assistant("lo"));
        assert_eq!(acc.content, "Hello");
    }

    #[test]
    fn merge_delta_concatenates_reasoning() {
        let mut acc = Message::assistant_empty();
        let mut d1 = Message::assistant("");
        d1.reasoning_content = Some("Let's".to_string());
        let mut d2 = Message::assistant("");
        d2.reasoning_content = Some(" think".to_string());
        acc.merge_delta(&d1);
        acc.merge_delta(&d2);
        assert_eq!(acc.reasoning_content.as_deref(), Some("Let's think"));
    }

    #[test]
    fn merge_delta_merges_tool_calls_by_index_and_appends_arguments() {
        let mut acc = Message::assistant_empty();
        let mut d1 = Message::assistant("");
        d1.tool_calls.push(ToolCall {
            index: 0,
            id: "call_1".to_string(),
            name: "bash".to_string(),
            arguments: "{\"cmd\":".to_string(),
        });
        let mut d2 = Message::assistant("");
        d2.tool_calls.push(ToolCall {
            index: 0,
            id: String::new(),
            name: String::new(),
            arguments: "\"ls\"}".to_string(),
        });
        acc.merge_delta(&d1);
        acc.merge_delta(&d2);
        assert_eq!(acc.tool_calls.len(), 1);
        assert_eq!(acc.tool_calls[0].arguments, "{\"cmd\":\"ls\"}");
        assert_eq!(acc.tool_calls[0].id, "call_1");
    }

    #[test]
    fn merge_delta_keeps_interleaved_indices_separate() {
        let mut acc = Message::assistant_empty();
        let mut d1 = Message::assistant("");
        d1.tool_calls.push(ToolCall {
            index: 0,
            id: "call_1".to_string(),
            name: "read_file".to_string(),
            arguments: String::new(),
        });
        d1.tool_calls.push(ToolCall {
            index: 1,
            id: "call_2".to_string(),
            name: "bash".to_string(),
            arguments: String::new(),
        });
        acc.merge_delta(&d1);
        assert_eq!(acc.tool_calls.len(), 2);
        assert_eq!(acc.tool_calls[0].name, "read_file");
        assert_eq!(acc.tool_calls[1].name, "bash");
    }

    #[test]
    fn serde_roundtrip_preserves_fields() {
        let m = Message::assistant("hello");
        let json = serde_json::to_string(&m).unwrap();
        let back: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(m, back);
    }
}
