#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
//! Shared test doubles and fixtures for the Agentix crates — a
//! scripted [`Backend`](agentix_llm::Backend), a scripted
//! [`ApprovalGate`](agentix_approval::ApprovalGate), and builders for
//! common [`Message`](agentix_types::Message)/
//! [`AgentProfile`](agentix_config::AgentProfile) shapes.
//!
//! Add to a crate's `Cargo.toml` as a dev-dependency:
//!
//! ```toml
//! [dev-dependencies]
//! agentix-test.workspace = true
//! ```

pub mod fixtures;
pub mod mocks;

pub use fixtures::*;
pub use mocks::*;
