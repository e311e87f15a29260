use async_stream::try_stream;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use agentix_types::{Message, MessageRole, ToolCall, Usage};

use crate::backend::{Backend, BackendConfig, Chunk, StreamBox};
use crate::error::{BackendError, BackendResult};

/// A backend talking to any OpenAI-compatible `/chat/completions`
/// endpoint (OpenAI itself, and the many self-hosted servers that
/// mirror its wire format).
pub struct OpenAiCompatBackend {
    client: reqwest::Client,
    config: BackendConfig,
}

impl OpenAiCompatBackend {
    /// Build a backend from a config. Reuses a single `reqwest::Client`
    /// across requests for connection pooling.
    #[must_use]
    pub fn new(config: BackendConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_default();
        Self { client, config }
    }

    fn messages_to_wire(system: &str, messages: &[Message]) -> Vec<Value> {
        let mut wire = Vec::with_capacity(messages.len() + 1);
        if !system.is_empty() {
            wire.push(json!({ "role": "system", "content": system }));
        }
        for m in messages {
            wire.push(message_to_wire(m));
        }
        wire
    }

    fn request_body(&self, system: &str, messages: &[Message], tools: &[Value], stream: bool) -> Value {
        let mut body = json!({
            "model": self.config.model,
            "messages": Self::messages_to_wire(system, messages),
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature,
            "stream": stream,
        });
        if !tools.is_empty() {
            body["tools"] = Value::Array(tools.to_vec());
        }
        if stream {
            body["stream_options"] = json!({ "include_usage": true });
        }
        body
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    async fn send(&self, body: Value, session_affinity: Option<&str>) -> BackendResult<reqwest::Response> {
        let mut req = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(&body);
        if let Some(affinity) = session_affinity {
            req = req.header("X-Session-Affinity", affinity);
        }
        let resp = req.send().await.map_err(|e| BackendError::Transport(e.to_string()))?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let status_code = status.as_u16();
        let body_text = resp.text().await.unwrap_or_default();
        Err(match status_code {
            401 | 403 => BackendError::Auth { reason: body_text },
            408 => BackendError::Timeout { elapsed_ms: 0 },
            429 => BackendError::RateLimited {
                retry_after_secs: parse_retry_after(&body_text),
            },
            400 | 422 => BackendError::invalid_request_from_body(status_code, &body_text),
            500..=599 => BackendError::ServerError {
                status: Some(status_code),
                reason: body_text,
            },
            _ => BackendError::Transport(format!("unexpected status {status_code}: {body_text}")),
        })
    }
}

#[async_trait::async_trait]
impl Backend for OpenAiCompatBackend {
    fn name(&self) -> &str {
        "openai-compat"
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    fn max_context_tokens(&self) -> u64 {
        128_000
    }

    async fn stream(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[Value],
        session_affinity: Option<&str>,
    ) -> BackendResult<StreamBox> {
        let body = self.request_body(system, messages, tools, true);
        debug!(model = %self.config.model, "starting streaming chat completion");
        let resp = self.send(body, session_affinity).await?;
        let mut byte_stream = resp.bytes_stream();

        let s = try_stream! {
            use futures::StreamExt;
            let mut buf = String::new();
            while let Some(next) = byte_stream.next().await {
                let bytes = next.map_err(|e| BackendError::Transport(e.to_string()))?;
                buf.push_str(&String::from_utf8_lossy(&bytes));
                while let Some(pos) = buf.find('\n') {
                    let line = buf[..pos].trim_end_matches('\r').to_string();
                    buf.drain(..=pos);
                    let Some(data) = line.strip_prefix("data: ") else { continue };
                    if data == "[DONE]" {
                        return;
                    }
                    if data.is_empty() {
                        continue;
                    }
                    let parsed: SseChatCompletionChunk = match serde_json::from_str(data) {
                        Ok(v) => v,
                        Err(e) => {
                            warn!(error = %e, line = %data, "failed to parse SSE chunk, skipping");
                            continue;
                        }
                    };
                    yield parsed.into_chunk();
                }
            }
        };
        Ok(Box::pin(s))
    }

    async fn complete(&self, system: &str, messages: &[Message], tools: &[Value]) -> BackendResult<(Message, Usage)> {
        let body = self.request_body(system, messages, tools, false);
        let resp = self.send(body, None).await?;
        let parsed: ChatCompletionResponse = resp
            .json()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;
        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| BackendError::InvalidRequest {
                reason: "response contained no choices".to_string(),
                oversized_context: false,
            })?;
        let usage = parsed.usage.map(Into::into).unwrap_or_default();
        Ok((wire_message_to_message(choice.message), usage))
    }
}

fn message_to_wire(m: &Message) -> Value {
    match m.role {
        MessageRole::System => json!({ "role": "system", "content": m.content }),
        MessageRole::User => json!({ "role": "user", "content": m.content }),
        MessageRole::Assistant => {
            let mut v = json!({ "role": "assistant", "content": m.content });
            if !m.tool_calls.is_empty() {
                v["tool_calls"] = Value::Array(
                    m.tool_calls
                        .iter()
                        .map(|c| {
                            json!({
                                "id": c.id,
                                "type": "function",
                                "function": { "name": c.name, "arguments": c.arguments },
                            })
                        })
                        .collect(),
                );
            }
            v
        }
        MessageRole::Tool => json!({
            "role": "tool",
            "tool_call_id": m.tool_call_id,
            "content": m.content,
        }),
    }
}

fn wire_message_to_message(w: WireMessage) -> Message {
    let mut m = Message::assistant(w.content.unwrap_or_default());
    m.reasoning_content = w.reasoning_content;
    m.tool_calls = w
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .enumerate()
        .map(|(index, c)| ToolCall {
            index,
            id: c.id,
            name: c.function.name,
            arguments: c.function.arguments,
        })
        .collect();
    m
}

fn parse_retry_after(body: &str) -> Option<u64> {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("retry_after_secs").and_then(Value::as_u64))
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    content: Option<String>,
    #[serde(default)]
    reasoning_content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Debug, Deserialize)]
struct WireToolCall {
    #[serde(default)]
    id: String,
    function: WireFunctionCall,
}

#[derive(Debug, Deserialize)]
struct WireFunctionCall {
    #[serde(default)]
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatCompletionChoice>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChoice {
    message: WireMessage,
}

#[derive(Debug, Deserialize, Serialize)]
struct WireUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
    total_tokens: u64,
}

impl From<WireUsage> for Usage {
    fn from(u: WireUsage) -> Self {
        Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SseChatCompletionChunk {
    #[serde(default)]
    choices: Vec<SseChoice>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct SseChoice {
    #[serde(default)]
    delta: SseDelta,
}

#[derive(Debug, Default, Deserialize)]
struct SseDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    reasoning_content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<SseToolCallDelta>>,
}

#[derive(Debug, Deserialize)]
struct SseToolCallDelta {
    index: usize,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: Option<SseFunctionDelta>,
}

#[derive(Debug, Default, Deserialize)]
struct SseFunctionDelta {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

impl SseChatCompletionChunk {
    fn into_chunk(self) -> Chunk {
        let mut delta = Message::assistant(String::new());
        if let Some(choice) = self.choices.into_iter().next() {
            if let Some(content) = choice.delta.content {
                delta.content = content;
            }
            delta.reasoning_content = choice.delta.reasoning_content;
            if let Some(tool_calls) = choice.delta.tool_calls {
                delta.tool_calls = tool_calls
                    .into_iter()
                    .map(|c| ToolCall {
                        index: c.index,
                        id: c.id.unwrap_or_default(),
                        name: c.function.as_ref().and_then(|f| f.name.clone()).unwrap_or_default(),
                        arguments: c.function.and_then(|f| f.arguments).unwrap_or_default(),
                    })
                    .collect();
            }
        }
        Chunk {
            message_delta: delta,
            usage: self.usage.map(Into::into),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_to_wire_includes_tool_calls_for_assistant() {
        let mut m = Message::assistant("");
        m.tool_calls.push(ToolCall {
            index: 0,
            id: "call_1".to_string(),
            name: "bash".to_string(),
            arguments: "{}".to_string(),
        });
        let wire = message_to_wire(&m);
        assert_eq!(wire["tool_calls"][0]["function"]["name"], "bash");
    }

    #[test]
    fn message_to_wire_tool_role_carries_call_id() {
        let m = Message::tool_result("call_1", "bash", "done");
        let wire = message_to_wire(&m);
        assert_eq!(wire["role"], "tool");
        assert_eq!(wire["tool_call_id"], "call_1");
    }

    #[test]
    fn sse_chunk_parses_content_delta() {
        let raw = r#"{"choices":[{"delta":{"content":"Hi"}}]}"#;
        let parsed: SseChatCompletionChunk = serde_json::from_str(raw).unwrap();
        let chunk = parsed.into_chunk();
        assert_eq!(chunk.message_delta.content, "Hi");
    }

    #[test]
    fn sse_chunk_parses_tool_call_delta_by_index() {
        let raw = r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"id":"call_1","function":{"name":"bash","arguments":"{}"}}]}}]}"#;
        let parsed: SseChatCompletionChunk = serde_json::from_str(raw).unwrap();
        let chunk = parsed.into_chunk();
        assert_eq!(chunk.message_delta.tool_calls[0].index, 0);
        assert_eq!(chunk.message_delta.tool_calls[0].name, "bash");
    }

    #[test]
    fn sse_chunk_with_usage_populates_usage() {
        let raw = r#"{"choices":[],"usage":{"prompt_tokens":10,"completion_tokens":5,"total_tokens":15}}"#;
        let parsed: SseChatCompletionChunk = serde_json::from_str(raw).unwrap();
        let chunk = parsed.into_chunk();
        assert_eq!(chunk.usage.unwrap().total_tokens, 15);
    }

    #[test]
    fn invalid_request_from_body_detects_oversized_context() {
        let err = BackendError::invalid_request_from_body(
            400,
            "This model's maximum context length is 8192 tokens",
        );
        match err {
            BackendError::InvalidRequest { oversized_context, .. } => assert!(oversized_context),
            _ => panic!("expected InvalidRequest"),
        }
    }
}
