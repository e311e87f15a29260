#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
//! The approval gate: the hook between a tool call needing
//! confirmation and whatever surface (TUI, chat adapter, test
//! harness) the host uses to get the user's answer.

mod gate;

pub use gate::{ApprovalDecision, ApprovalGate, CallbackApprovalGate, ConfigWriteBack, NullApprovalGate};
