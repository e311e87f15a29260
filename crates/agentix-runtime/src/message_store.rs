use agentix_types::Message;

/// The append-only conversation the agent loop reads and writes each turn.
///
/// Compaction is the only operation that removes entries; everything
/// else only appends.
#[derive(Debug, Clone, Default)]
pub struct MessageStore {
    messages: Vec<Message>,
}

impl MessageStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message.
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// The full message list, in order.
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Number of messages currently stored.
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the store has no messages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Rough token estimate for the whole conversation (content length
    /// / 4, the same crude heuristic used elsewhere in this stack when
    /// a provider doesn't expose a tokenizer).
    #[must_use]
    pub fn estimated_tokens(&self) -> u64 {
        self.messages
            .iter()
            .map(|m| (m.content.len() + m.reasoning_content.as_ref().map_or(0, String::len)) as u64 / 4)
            .sum()
    }

    /// Replace everything but the leading system message (if present)
    /// and the most recent `keep_recent` messages with a single
    /// summary message. Returns how many messages were removed.
    ///
    /// This is the only place the store drops history; it exists so
    /// the auto-compact middleware can shrink context that's
    /// approaching the model's window without losing the
    /// instructions or the immediate conversation.
    pub fn compact(&mut self, keep_recent: usize, summary: Message) -> usize {
        let has_leading_system = self.messages.first().is_some_and(|m| m.role == agentix_types::MessageRole::System);
        let head_len = usize::from(has_leading_system);
        let keep_from = self.messages.len().saturating_sub(keep_recent).max(head_len);

        let removed = keep_from.saturating_sub(head_len);
        if removed == 0 {
            return 0;
        }

        let mut rebuilt = Vec::with_capacity(head_len + 1 + (self.messages.len() - keep_from));
        rebuilt.extend(self.messages.drain(..head_len));
        rebuilt.push(summary);
        rebuilt.extend(self.messages.drain(keep_from - head_len..));
        self.messages = rebuilt;
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentix_types::Message;

    #[test]
    fn compact_preserves_leading_system_message() {
        let mut store = MessageStore::new();
        store.push(Message::system("be helpful"));
        for i in 0..10 {
            store.push(Message::user(format!("msg {i}")));
        }
        let removed = store.compact(2, Message::system("summary"));
        assert!(removed > 0);
        assert_eq!(store.messages()[0].role, agentix_types::MessageRole::System);
        assert_eq!(store.messages()[0].content, "be helpful");
        assert_eq!(store.messages()[1].content, "summary");
    }

    #[test]
    fn compact_keeps_the_most_recent_messages() {
        let mut store = MessageStore::new();
        for i in 0..10 {
            store.push(Message::user(format!("msg {i}")));
        }
        store.compact(3, Message::system("summary"));
        let tail: Vec<_> = store.messages().iter().skip(1).map(|m| m.content.clone()).collect();
        assert_eq!(tail, vec!["msg 7", "msg 8", "msg 9"]);
    }

    #[test]
    fn compact_is_a_noop_when_nothing_exceeds_keep_recent() {
        let mut store = MessageStore::new();
        store.push(Message::user("only message"));
        let removed = store.compact(5, Message::system("summary"));
        assert_eq!(removed, 0);
        assert_eq!(store.len(), 1);
    }
}
