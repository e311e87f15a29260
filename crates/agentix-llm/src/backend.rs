use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use agentix_types::{Message, Usage};

use crate::error::BackendResult;

/// A boxed stream of streaming response chunks, pinned for use behind
/// a trait object.
pub type StreamBox = Pin<Box<dyn Stream<Item = BackendResult<Chunk>> + Send>>;

/// One increment of a streaming response.
#[derive(Debug, Clone)]
pub struct Chunk {
    /// The message delta for this increment. Merge into an
    /// accumulator with [`Message::merge_delta`].
    pub message_delta: Message,
    /// Usage for the turn, present only on the terminal chunk for
    /// backends that report it (matches
    /// `stream_options.include_usage` on OpenAI-compatible backends).
    pub usage: Option<Usage>,
}

/// Configuration shared by every concrete backend.
#[derive(Clone)]
pub struct BackendConfig {
    /// API key or bearer token.
    pub api_key: String,
    /// Model identifier to request.
    pub model: String,
    /// Base URL; lets callers point at a self-hosted or compatible endpoint.
    pub base_url: String,
    /// Maximum tokens to request in the response.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
    /// Request timeout.
    pub timeout: std::time::Duration,
}

impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendConfig")
            .field("has_api_key", &!self.api_key.is_empty())
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl BackendConfig {
    /// Build a config with sensible defaults for everything but the
    /// api key and model.
    #[must_use]
    pub fn new(api_key: impl Into<String>, model: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: base_url.into(),
            max_tokens: 4096,
            temperature: 0.7,
            timeout: std::time::Duration::from_secs(120),
        }
    }
}

/// Vendor-neutral streaming chat backend.
///
/// Implementors wrap one concrete wire protocol (OpenAI-compatible
/// SSE, Anthropic Messages, ...); the agent loop only ever talks to
/// this trait.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Human-readable backend name, used in logs.
    fn name(&self) -> &str;

    /// Model currently configured.
    fn model(&self) -> &str;

    /// Maximum context window, in tokens, this model supports.
    fn max_context_tokens(&self) -> u64;

    /// Request a streaming completion.
    ///
    /// `system` is the system prompt; `tools` are the JSON-schema
    /// tool definitions available this turn. `session_affinity`, when
    /// set, is forwarded as a sticky-routing hint (e.g. a header) so a
    /// provider can route repeated calls for one session to the same
    /// upstream replica.
    async fn stream(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[serde_json::Value],
        session_affinity: Option<&str>,
    ) -> BackendResult<StreamBox>;

    /// Request a non-streaming completion. Used for auxiliary calls
    /// that don't need incremental output, such as context
    /// compaction's summarize step.
    async fn complete(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[serde_json::Value],
    ) -> BackendResult<(Message, Usage)>;
}
