use thiserror::Error;

/// Errors a [`Backend`](crate::Backend) can surface.
///
/// The agent loop inspects variants (not their string form) to decide
/// retry behavior — in particular `InvalidRequest { oversized_context:
/// true }` triggers one automatic compaction-and-retry, per the
/// middleware pipeline's auto-compact contract.
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    /// The request did not complete within the configured timeout.
    #[error("request timed out after {elapsed_ms}ms")]
    Timeout {
        /// How long the request ran before timing out.
        elapsed_ms: u64,
    },

    /// The backend rejected the request for exceeding a rate limit.
    #[error("rate limited{}", retry_after_secs.map(|s| format!(", retry after {s}s")).unwrap_or_default())]
    RateLimited {
        /// Seconds to wait before retrying, if the backend supplied one.
        retry_after_secs: Option<u64>,
    },

    /// The request was rejected for an authentication or authorization reason.
    #[error("authentication failed: {reason}")]
    Auth {
        /// Backend-supplied explanation.
        reason: String,
    },

    /// The backend rejected the request as malformed.
    #[error("invalid request: {reason}")]
    InvalidRequest {
        /// Backend-supplied explanation.
        reason: String,
        /// Set when the rejection looks like a context-window overflow
        /// (the backend's own wording for "too many tokens").
        oversized_context: bool,
    },

    /// The backend accepted the request but failed while producing a response.
    #[error("backend server error: {reason}")]
    ServerError {
        /// HTTP status code, if applicable.
        status: Option<u16>,
        /// Backend-supplied explanation.
        reason: String,
    },

    /// The request never reached the backend, or its response could
    /// not be parsed.
    #[error("transport error: {0}")]
    Transport(String),
}

impl BackendError {
    /// Best-effort detection of an oversized-context rejection from an
    /// HTTP status and response body, shared by every HTTP-based
    /// backend's error mapping.
    #[must_use]
    pub fn invalid_request_from_body(status: u16, body: &str) -> Self {
        let lower = body.to_ascii_lowercase();
        let oversized = status == 400
            && (lower.contains("context length")
                || lower.contains("context_length")
                || lower.contains("maximum context")
                || lower.contains("too many tokens"));
        Self::InvalidRequest {
            reason: body.to_string(),
            oversized_context: oversized,
        }
    }
}

/// Result type for backend operations.
pub type BackendResult<T> = Result<T, BackendError>;
