//! Error types for atlasdash.
//!
//! Library crates use [`DocsetError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all docset build operations.
#[derive(Debug, thiserror::Error)]
pub enum DocsetError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error while talking to the documentation feed.
    #[error("network error: {0}")]
    Network(String),

    /// Malformed feed or content payload.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Index store error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (missing link, bad concurrency, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// A background download task panicked or was cancelled.
    #[error("task error: {0}")]
    Task(String),

    /// No type descriptor matched the entry and no ancestor cascades a type.
    #[error("type not found: {text} {id}")]
    TypeNotFound { text: String, id: String },

    /// The retrieved document is not the latest published version.
    #[error("retrieved version is not the latest: found {found}, latest is {latest}")]
    VersionMismatch { found: String, latest: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, DocsetError>;

impl DocsetError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether the build may carry on after this error (logged, not raised).
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::TypeNotFound { .. } | Self::VersionMismatch { .. })
    }
}
