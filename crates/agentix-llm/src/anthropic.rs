use async_stream::try_stream;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use agentix_types::{Message, MessageRole, ToolCall, Usage};

use crate::backend::{Backend, BackendConfig, Chunk, StreamBox};
use crate::error::{BackendError, BackendResult};

/// A backend talking to the Anthropic Messages API.
///
/// Exists alongside [`OpenAiCompatBackend`](crate::OpenAiCompatBackend)
/// to prove the [`Backend`] trait is not shaped around any one
/// vendor's wire format — the two use unrelated request/response
/// schemas but expose the same streaming contract.
pub struct AnthropicMessagesBackend {
    client: reqwest::Client,
    config: BackendConfig,
}

const ANTHROPIC_VERSION: &str = "2023-06-01";

impl AnthropicMessagesBackend {
    /// Build a backend from a config.
    #[must_use]
    pub fn new(config: BackendConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_default();
        Self { client, config }
    }

    fn request_body(&self, system: &str, messages: &[Message], tools: &[Value], stream: bool) -> Value {
        let mut body = json!({
            "model": self.config.model,
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature,
            "messages": messages.iter().filter(|m| m.role != MessageRole::System).map(message_to_wire).collect::<Vec<_>>(),
            "stream": stream,
        });
        if !system.is_empty() {
            body["system"] = json!(system);
        }
        if !tools.is_empty() {
            body["tools"] = Value::Array(tools.to_vec());
        }
        body
    }

    async fn send(&self, body: Value) -> BackendResult<reqwest::Response> {
        let resp = self
            .client
            .post(format!("{}/v1/messages", self.config.base_url.trim_end_matches('/')))
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let status_code = status.as_u16();
        let body_text = resp.text().await.unwrap_or_default();
        Err(match status_code {
            401 => BackendError::Auth { reason: body_text },
            429 => BackendError::RateLimited { retry_after_secs: None },
            400 => BackendError::invalid_request_from_body(status_code, &body_text),
            500..=599 => BackendError::ServerError { status: Some(status_code), reason: body_text },
            _ => BackendError::Transport(format!("unexpected status {status_code}: {body_text}")),
        })
    }
}

#[async_trait::async_trait]
impl Backend for AnthropicMessagesBackend {
    fn name(&self) -> &str {
        "anthropic-messages"
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    fn max_context_tokens(&self) -> u64 {
        200_000
    }

    async fn stream(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[Value],
        _session_affinity: Option<&str>,
    ) -> BackendResult<StreamBox> {
        let body = self.request_body(system, messages, tools, true);
        debug!(model = %self.config.model, "starting anthropic streaming message");
        let resp = self.send(body).await?;
        let mut byte_stream = resp.bytes_stream();

        let s = try_stream! {
            use futures::StreamExt;
            let mut buf = String::new();
            let mut current_index = 0usize;
            while let Some(next) = byte_stream.next().await {
                let bytes = next.map_err(|e| BackendError::Transport(e.to_string()))?;
                buf.push_str(&String::from_utf8_lossy(&bytes));
                while let Some(pos) = buf.find('\n') {
                    let line = buf[..pos].trim_end_matches('\r').to_string();
                    buf.drain(..=pos);
                    let Some(data) = line.strip_prefix("data: ") else { continue };
                    if data.is_empty() {
                        continue;
                    }
                    let event: Value = match serde_json::from_str(data) {
                        Ok(v) => v,
                        Err(e) => {
                            warn!(error = %e, line = %data, "failed to parse anthropic SSE event, skipping");
                            continue;
                        }
                    };
                    match event.get("type").and_then(Value::as_str) {
                        Some("content_block_start") => {
                            current_index = event["index"].as_u64().unwrap_or(0) as usize;
                        }
                        Some("content_block_delta") => {
                            if let Some(chunk) = delta_event_to_chunk(&event, current_index) {
                                yield chunk;
                            }
                        }
                        Some("message_delta") => {
                            if let Some(usage) = event.get("usage") {
                                yield Chunk {
                                    message_delta: Message::assistant(String::new()),
                                    usage: parse_usage(usage),
                                };
                            }
                        }
                        Some("message_stop") => return,
                        _ => {}
                    }
                }
            }
        };
        Ok(Box::pin(s))
    }

    async fn complete(&self, system: &str, messages: &[Message], tools: &[Value]) -> BackendResult<(Message, Usage)> {
        let body = self.request_body(system, messages, tools, false);
        let resp = self.send(body).await?;
        let parsed: AnthropicResponse = resp.json().await.map_err(|e| BackendError::Transport(e.to_string()))?;
        let mut message = Message::assistant(String::new());
        let mut tool_index = 0;
        for block in parsed.content {
            match block {
                ContentBlock::Text { text } => message.content.push_str(&text),
                ContentBlock::ToolUse { id, name, input } => {
                    message.tool_calls.push(ToolCall {
                        index: tool_index,
                        id,
                        name,
                        arguments: input.to_string(),
                    });
                    tool_index += 1;
                }
            }
        }
        let usage = Usage {
            prompt_tokens: parsed.usage.input_tokens,
            completion_tokens: parsed.usage.output_tokens,
            total_tokens: parsed.usage.input_tokens + parsed.usage.output_tokens,
        };
        Ok((message, usage))
    }
}

fn message_to_wire(m: &Message) -> Value {
    match m.role {
        MessageRole::User => json!({ "role": "user", "content": m.content }),
        MessageRole::Assistant => {
            let mut content: Vec<Value> = Vec::new();
            if !m.content.is_empty() {
                content.push(json!({ "type": "text", "text": m.content }));
            }
            for call in &m.tool_calls {
                content.push(json!({
                    "type": "tool_use",
                    "id": call.id,
                    "name": call.name,
                    "input": serde_json::from_str::<Value>(&call.arguments).unwrap_or(Value::Null),
                }));
            }
            json!({ "role": "assistant", "content": content })
        }
        MessageRole::Tool => json!({
            "role": "user",
            "content": [{
                "type": "tool_result",
                "tool_use_id": m.tool_call_id,
                "content": m.content,
            }],
        }),
        MessageRole::System => json!({ "role": "user", "content": m.content }),
    }
}

fn delta_event_to_chunk(event: &Value, index: usize) -> Option<Chunk> {
    let delta = event.get("delta")?;
    let mut message = Message::assistant(String::new());
    match delta.get("type").and_then(Value::as_str) {
        Some("text_delta") => message.content = delta["text"].as_str().unwrap_or_default().to_string(),
        Some("thinking_delta") => {
            message.reasoning_content = Some(delta["thinking"].as_str().unwrap_or_default().to_string());
        }
        Some("input_json_delta") => {
            message.tool_calls.push(ToolCall {
                index,
                id: String::new(),
                name: String::new(),
                arguments: delta["partial_json"].as_str().unwrap_or_default().to_string(),
            });
        }
        _ => return None,
    }
    Some(Chunk { message_delta: message, usage: None })
}

fn parse_usage(v: &Value) -> Option<Usage> {
    let input = v.get("input_tokens").and_then(Value::as_u64).unwrap_or(0);
    let output = v.get("output_tokens").and_then(Value::as_u64)?;
    Some(Usage { prompt_tokens: input, completion_tokens: output, total_tokens: input + output })
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
    usage: AnthropicUsage,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: u64,
    output_tokens: u64,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text { text: String },
    ToolUse { id: String, name: String, input: Value },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_result_message_becomes_user_tool_result_block() {
        let m = Message::tool_result("toolu_1", "bash", "ok");
        let wire = message_to_wire(&m);
        assert_eq!(wire["role"], "user");
        assert_eq!(wire["content"][0]["type"], "tool_result");
        assert_eq!(wire["content"][0]["tool_use_id"], "toolu_1");
    }

    #[test]
    fn delta_event_text_delta_becomes_content_chunk() {
        let event = json!({
            "type": "content_block_delta",
            "index": 0,
            "delta": { "type": "text_delta", "text": "Hi" },
        });
        let chunk = delta_event_to_chunk(&event, 0).unwrap();
        assert_eq!(chunk.message_delta.content, "Hi");
    }

    #[test]
    fn delta_event_input_json_delta_becomes_tool_call_fragment() {
        let event = json!({
            "type": "content_block_delta",
            "index": 1,
            "delta": { "type": "input_json_delta", "partial_json": "{\"a\":1}" },
        });
        let chunk = delta_event_to_chunk(&event, 1).unwrap();
        assert_eq!(chunk.message_delta.tool_calls[0].index, 1);
        assert_eq!(chunk.message_delta.tool_calls[0].arguments, "{\"a\":1}");
    }
}
