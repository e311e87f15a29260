use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

/// The user's answer to one approval request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApprovalDecision {
    /// Run this call, and only this call.
    AllowOnce,
    /// Run this call, and flip the tool's permission to always-allow
    /// for the rest of the session.
    AllowAlways,
    /// Don't run this call; `reason` is surfaced to the model as the
    /// tool's result so it can adapt.
    RejectOnce {
        /// Why the user rejected it.
        reason: String,
    },
    /// Abandon the whole turn. Any other tool calls in the same
    /// assistant message are synthetically marked cancelled rather
    /// than run.
    Cancel,
}

/// Gates a tool call behind explicit user confirmation.
///
/// `ask` returns the decision plus an optional message — for
/// `RejectOnce` the message is the rejection reason surfaced to the
/// model; for other decisions it's an optional free-text note the UI
/// collected alongside the choice.
#[async_trait]
pub trait ApprovalGate: Send + Sync {
    /// Ask whether `tool_name(args)` (tagged by `tool_call_id`) may run.
    async fn ask(&self, tool_name: &str, args: &Value, tool_call_id: &str) -> (ApprovalDecision, Option<String>);
}

/// An approval gate that allows everything without asking — used by
/// auto-approve agent profiles, and by hosts with no human in the loop.
pub struct NullApprovalGate;

#[async_trait]
impl ApprovalGate for NullApprovalGate {
    async fn ask(&self, _tool_name: &str, _args: &Value, _tool_call_id: &str) -> (ApprovalDecision, Option<String>) {
        (ApprovalDecision::AllowOnce, None)
    }
}

/// A closure the gate calls to persist an "allow always" decision.
///
/// Kept as a type-erased closure rather than a concrete
/// `agentix-config` type so this crate never depends on the config
/// crate — the same cyclic-ownership-breaking shape the agent loop
/// uses to read configuration through a getter.
pub type ConfigWriteBack = Arc<dyn Fn(&str) + Send + Sync>;

/// An approval gate backed by a host-supplied async callback (a TUI
/// prompt, a chat adapter's button message, a test harness's scripted
/// queue).
pub struct CallbackApprovalGate {
    #[allow(clippy::type_complexity)]
    callback: Arc<
        dyn Fn(String, Value, String) -> Pin<Box<dyn Future<Output = (ApprovalDecision, Option<String>)> + Send>>
            + Send
            + Sync,
    >,
    on_allow_always: Option<ConfigWriteBack>,
}

impl CallbackApprovalGate {
    /// Build a gate from an async callback. `on_allow_always`, if
    /// given, is invoked with the tool name whenever the user chooses
    /// "allow always" so the host can persist that into its live
    /// permission config.
    #[allow(clippy::type_complexity)]
    pub fn new(
        callback: Arc<
            dyn Fn(String, Value, String) -> Pin<Box<dyn Future<Output = (ApprovalDecision, Option<String>)> + Send>>
                + Send
                + Sync,
        >,
        on_allow_always: Option<ConfigWriteBack>,
    ) -> Self {
        Self { callback, on_allow_always }
    }
}

#[async_trait]
impl ApprovalGate for CallbackApprovalGate {
    async fn ask(&self, tool_name: &str, args: &Value, tool_call_id: &str) -> (ApprovalDecision, Option<String>) {
        let (decision, message) =
            (self.callback)(tool_name.to_string(), args.clone(), tool_call_id.to_string()).await;
        if decision == ApprovalDecision::AllowAlways {
            if let Some(write_back) = &self.on_allow_always {
                debug!(tool = %tool_name, "persisting allow-always decision");
                write_back(tool_name);
            }
        }
        (decision, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn null_gate_always_allows_once() {
        let gate = NullApprovalGate;
        let (decision, _) = gate.ask("bash", &Value::Null, "call_1").await;
        assert_eq!(decision, ApprovalDecision::AllowOnce);
    }

    #[tokio::test]
    async fn callback_gate_forwards_decision() {
        let gate = CallbackApprovalGate::new(
            Arc::new(|_name, _args, _id| {
                Box::pin(async { (ApprovalDecision::RejectOnce { reason: "no".to_string() }, None) })
            }),
            None,
        );
        let (decision, _) = gate.ask("bash", &Value::Null, "call_1").await;
        assert_eq!(decision, ApprovalDecision::RejectOnce { reason: "no".to_string() });
    }

    #[tokio::test]
    async fn allow_always_invokes_write_back() {
        let persisted = Arc::new(std::sync::Mutex::new(None));
        let persisted_clone = Arc::clone(&persisted);
        let gate = CallbackApprovalGate::new(
            Arc::new(|_name, _args, _id| Box::pin(async { (ApprovalDecision::AllowAlways, None) })),
            Some(Arc::new(move |name: &str| {
                *persisted_clone.lock().unwrap() = Some(name.to_string());
            })),
        );
        gate.ask("bash", &Value::Null, "call_1").await;
        assert_eq!(persisted.lock().unwrap().as_deref(), Some("bash"));
    }
}
