//! Agentix CLI
//!
//! A thin, non-interactive host for the agent loop: wires an
//! OpenAI-compatible backend, the built-in tool set, and an
//! auto-approve gate into a single [`AgentLoop`] run, then prints the
//! resulting event stream to stdout. Demonstrates the crate stack is
//! usable end-to-end without the TUI/ACP host surface that lives
//! outside this repo.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use futures::StreamExt;

use agentix_approval::NullApprovalGate;
use agentix_config::AgentRegistry;
use agentix_llm::{BackendConfig, OpenAiCompatBackend};
use agentix_runtime::AgentLoop;
use agentix_tools::ToolFilter;
use agentix_types::Event;

/// Run a single agent turn against an OpenAI-compatible backend.
#[derive(Parser)]
#[command(name = "agentix", author, version, about, long_about = None)]
struct Cli {
    /// The message to send as the turn's user input.
    prompt: String,

    /// Model identifier to request.
    #[arg(long, default_value = "gpt-4o-mini")]
    model: String,

    /// Base URL of the OpenAI-compatible endpoint.
    #[arg(long, default_value = "https://api.openai.com/v1")]
    base_url: String,

    /// Environment variable to read the API key from.
    #[arg(long, default_value = "OPENAI_API_KEY")]
    api_key_env: String,

    /// Agent profile to run: default, plan, accept_edits, or auto_approve.
    #[arg(long, default_value = "default")]
    profile: String,

    /// Directory tools resolve relative paths against.
    #[arg(long, default_value = ".")]
    workspace: PathBuf,

    /// Enable debug logging.
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "agentix=debug,info" } else { "agentix=info,warn" };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let api_key = std::env::var(&cli.api_key_env)
        .with_context(|| format!("environment variable {} is not set", cli.api_key_env))?;

    let registry = AgentRegistry::with_builtins();
    let Some(profile) = registry.get(&cli.profile) else {
        bail!("unknown profile: {} (expected one of {:?})", cli.profile, registry.order());
    };
    let effective_config = profile.apply_to_config(&agentix_config::RuntimeConfig::default());
    let tool_filter = ToolFilter { enabled: profile.enabled_tools.clone(), disabled: profile.disabled_tools.clone() };

    let backend_config = BackendConfig::new(api_key, cli.model, cli.base_url);
    let backend = Arc::new(OpenAiCompatBackend::new(backend_config));

    let agent_loop = AgentLoop::builder()
        .backend(backend)
        .approval(Arc::new(NullApprovalGate))
        .config(effective_config)
        .system_prompt(profile.system_prompt.clone())
        .tool_filter(tool_filter)
        .is_plan_agent(profile.name == "plan")
        .workspace_root(cli.workspace)
        .build()?;

    let mut events = agent_loop.run(cli.prompt);
    while let Some(event) = events.next().await {
        print_event(&event);
    }

    Ok(())
}

fn print_event(event: &Event) {
    match event {
        Event::UserMessage { .. } => {}
        Event::Assistant { delta, .. } => print!("{delta}"),
        Event::Reasoning { delta } => eprint!("{delta}"),
        Event::ToolCall { name, arguments, .. } => println!("\n[tool call] {name}({arguments})"),
        Event::ToolStream { chunk, .. } => print!("{chunk}"),
        Event::ToolResult { name, content, is_error, skipped, skip_reason, .. } => {
            let label = if *skipped {
                "skipped"
            } else if *is_error {
                "error"
            } else {
                "result"
            };
            match skip_reason {
                Some(reason) => println!("\n[tool {label}] {name}: {reason}"),
                None => println!("\n[tool {label}] {name}: {content}"),
            }
        }
        Event::CompactStart { messages_compacted, .. } => {
            println!("\n[compacting {messages_compacted} messages]");
        }
        Event::CompactEnd { old_context_tokens, new_context_tokens, .. } => {
            println!("[compaction done, ~{old_context_tokens} -> ~{new_context_tokens} tokens]");
        }
        Event::Stopped { reason, usage } => {
            println!("\n[stopped: {reason:?}, {} tokens used]", usage.total_tokens);
        }
    }
}
