//! Error types for the codexfi memory engine.
//!
//! Variants map onto the error taxonomy consumers are expected to branch
//! on: `E_ARG`, `E_DIM`, `E_IO`, `E_UPSTREAM`, `E_TIMEOUT`, `E_NOT_FOUND`.

use thiserror::Error;

/// Result type alias for codexfi operations.
pub type Result<T> = std::result::Result<T, CodexfiError>;

/// Coarse error kind, stable across variant changes, for callers that
/// want to branch on taxonomy rather than match every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Arg,
    Dim,
    Io,
    Upstream,
    Timeout,
    NotFound,
}

/// Main error type for the codexfi memory engine.
#[derive(Error, Debug)]
pub enum CodexfiError {
    #[error("invalid argument: {0}")]
    InvalidArg(String),

    #[error("vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("memory not found: {0}")]
    NotFound(String),

    #[error("upstream error ({provider}): {message}")]
    Upstream {
        provider: String,
        message: String,
        /// Whether the failure is transient (5xx, 429, timeout) per
        /// `retry::classify_status`, as opposed to a fatal 4xx.
        retryable: bool,
    },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("operation cancelled")]
    Cancelled,
}

impl CodexfiError {
    /// Whether a retry of the same call is reasonable. `Upstream` defers to
    /// the classification it was constructed with (fatal 4xx vs. transient
    /// 5xx/429); a bare `Http`/`Timeout` (no HTTP status to classify, e.g. a
    /// connection reset or a client-side deadline) is always retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            CodexfiError::Upstream { retryable, .. } => *retryable,
            CodexfiError::Http(_) | CodexfiError::Timeout(_) => true,
            _ => false,
        }
    }

    /// The coarse taxonomy bucket this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CodexfiError::InvalidArg(_) | CodexfiError::Config(_) => ErrorKind::Arg,
            CodexfiError::DimensionMismatch { .. } => ErrorKind::Dim,
            CodexfiError::Store(_) | CodexfiError::Io(_) | CodexfiError::Serialization(_) => {
                ErrorKind::Io
            }
            CodexfiError::NotFound(_) => ErrorKind::NotFound,
            CodexfiError::Upstream { .. } | CodexfiError::Http(_) => ErrorKind::Upstream,
            CodexfiError::Timeout(_) => ErrorKind::Timeout,
            CodexfiError::Cancelled => ErrorKind::Arg,
        }
    }
}
