use thiserror::Error;

/// Errors the agent loop can surface outside the event stream (the
/// stream itself reports failures as `Event::Stopped { reason:
/// StopReason::Error, .. }`; this type is for failures in setup code
/// around it, like building a loop).
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The configured backend or tool registry is missing something
    /// the loop requires.
    #[error("invalid agent loop configuration: {0}")]
    InvalidConfiguration(String),
}
