#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
//! The agent loop: middleware pipeline, message store, and the
//! turn-based state machine that drives a [`Backend`](agentix_llm::Backend)
//! and a [`ToolRegistry`](agentix_tools::ToolRegistry) to produce a
//! stream of [`Event`](agentix_types::Event)s.

mod agent_loop;
mod error;
mod message_store;
mod middleware;
mod subagent_executor;

pub use agent_loop::{AgentLoop, AgentLoopBuilder, EventStream};
pub use error::RuntimeError;
pub use message_store::MessageStore;
pub use middleware::{
    AutoCompactMiddleware, CostLimitMiddleware, Middleware, MiddlewareAction, MiddlewarePipeline,
    PlanAgentReminderMiddleware, TurnLimitMiddleware,
};
pub use subagent_executor::{SubAgentExecutor, SubAgentPool};
