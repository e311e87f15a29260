use thiserror::Error;

/// Errors from loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A profile file could not be read.
    #[error("failed to read profile file {path}: {reason}")]
    Read {
        /// Path that failed to read.
        path: String,
        /// Underlying reason.
        reason: String,
    },
    /// A profile file was not valid TOML, or didn't match the
    /// expected shape.
    #[error("failed to parse profile file {path}: {reason}")]
    Parse {
        /// Path that failed to parse.
        path: String,
        /// Underlying reason.
        reason: String,
    },
    /// No agent profile with the given name is registered.
    #[error("unknown agent profile: {0}")]
    UnknownProfile(String),
}
