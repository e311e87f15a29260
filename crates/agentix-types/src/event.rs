use serde::{Deserialize, Serialize};

use crate::Usage;

/// Why a turn or loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The assistant produced a final answer with no pending tool calls.
    EndTurn,
    /// The assistant requested tool calls; the loop will dispatch them
    /// and continue.
    ToolCalls,
    /// A cancellation was observed at a checkpoint.
    Cancelled,
    /// A middleware requested the loop stop.
    MiddlewareStop,
    /// The loop stopped because of an unrecoverable error.
    Error,
}

/// An event emitted by a running [`AgentLoop`](../agentix_runtime/struct.AgentLoop.html).
///
/// Consumers drive the loop by polling this stream; nothing outside
/// this enum is part of the loop's public surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// The user message that started this turn.
    UserMessage {
        /// The message as appended to the conversation.
        message: String,
    },
    /// A chunk of assistant text content.
    Assistant {
        /// The incremental text delta.
        delta: String,
        /// Whether this text is a middleware-synthesized notice (e.g.
        /// a turn/cost-limit or plan-agent reminder) rather than
        /// model output. When set, the turn ends immediately after —
        /// no further backend call is made.
        #[serde(default)]
        stopped_by_middleware: bool,
    },
    /// A chunk of assistant reasoning content.
    Reasoning {
        /// The incremental reasoning delta.
        delta: String,
    },
    /// A tool call became fully available and is about to run.
    ToolCall {
        /// Id of the call, echoed back in the matching `ToolResult`.
        tool_call_id: String,
        /// Tool name.
        name: String,
        /// Parsed (or raw, if unparseable) arguments.
        arguments: String,
    },
    /// A tool finished running.
    ToolResult {
        /// Id of the call this is a result for.
        tool_call_id: String,
        /// Tool name.
        name: String,
        /// Tool output, or an error description.
        content: String,
        /// Whether the tool call failed.
        is_error: bool,
        /// Whether the tool never ran at all — denied by the approval
        /// gate, cancelled before it started, or an unknown tool name.
        /// Distinguishes "didn't run" from "ran and failed"
        /// (`is_error`).
        #[serde(default)]
        skipped: bool,
        /// Why the call was skipped, set whenever `skipped` is true.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        skip_reason: Option<String>,
        /// Wall-clock time the tool actually ran for, in milliseconds.
        /// `0` for calls that never reached `Tool::run`.
        #[serde(default)]
        duration_ms: u64,
    },
    /// Progress output from a tool while it is still running.
    ToolStream {
        /// Id of the call this progress belongs to.
        tool_call_id: String,
        /// Incremental progress text.
        chunk: String,
    },
    /// Context compaction began.
    CompactStart {
        /// Id correlating this event with the matching `CompactEnd`.
        tool_call_id: String,
        /// Number of messages being summarized away.
        messages_compacted: usize,
    },
    /// Context compaction finished.
    CompactEnd {
        /// Id matching the `CompactStart` this concludes.
        tool_call_id: String,
        /// Token estimate for the context just before compaction.
        old_context_tokens: u64,
        /// Token estimate for the resulting, compacted context.
        new_context_tokens: u64,
    },
    /// The loop (or the current turn) stopped.
    Stopped {
        /// Why it stopped.
        reason: StopReason,
        /// Cumulative usage for the turn(s) that ran.
        usage: Usage,
    },
}
