//! Common error types for tokensync.

use thiserror::Error;

/// Top-level error type for tokensync operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Credential rejected by the remote.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// No project matched the configured `owner/repository` exactly.
    #[error("Project not accessible: {0}")]
    ProjectNotAccessible(String),

    /// Transport-level failure (DNS, TLS, connection reset, ...).
    #[error("Network error: {0}")]
    Network(String),

    /// Remote answered with a non-success status.
    #[error("Remote API error ({status}): {message}")]
    RemoteApi { status: u16, message: String },

    /// Blob or response body is not JSON of the expected shape.
    #[error("Malformed content: {0}")]
    MalformedContent(String),

    /// Credential is valid but lacks access.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::MalformedContent(err.to_string())
    }
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;
