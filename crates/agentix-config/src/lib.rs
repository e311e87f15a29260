#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
//! Agent profiles, profile discovery/cycling, and the in-memory
//! runtime configuration the middleware pipeline reads.
//!
//! Persisting any of this to disk (beyond the one discovery path that
//! reads TOML profile files) is a host concern, not this crate's —
//! see the "Non-goals" section of the design notes.

mod error;
mod profile;
mod registry;
mod runtime_config;

pub use error::ConfigError;
pub use profile::{AgentProfile, AgentType};
pub use registry::AgentRegistry;
pub use runtime_config::{RuntimeConfig, ToolPermission};
