#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
//! Streaming LLM backend abstraction.
//!
//! Defines the [`Backend`] trait the agent loop drives, a vendor
//! neutral error taxonomy, and two concrete backends: an
//! OpenAI-compatible chat-completions client and an Anthropic
//! Messages API client.

mod anthropic;
mod backend;
mod error;
mod openai_compat;

pub use anthropic::AnthropicMessagesBackend;
pub use backend::{Backend, BackendConfig, Chunk, StreamBox};
pub use error::{BackendError, BackendResult};
pub use openai_compat::OpenAiCompatBackend;
