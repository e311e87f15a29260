#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
//! Core data model for the Agentix agent loop: messages, tool calls,
//! usage accounting, and the event stream a running loop emits.

mod event;
mod message;
mod usage;

pub use event::{Event, StopReason};
pub use message::{Message, MessageRole, ToolCall};
pub use usage::Usage;
