//! Error types for cloud backends.
//!
//! Store failures (unreadable state, bad JSON) are local problems and never
//! worth retrying. Remote failures keep the classification the engine gives
//! them, so retry logic works the same way for both.

use declarative::{ErrorCategory, ReconcileError, RemoteError};
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while running a cloud backend.
#[derive(Debug, Error)]
pub enum Error {
    /// State file exists but could not be parsed
    #[error("corrupt state file {path}: {message}")]
    CorruptState {
        /// Location of the state file
        path: PathBuf,
        /// Parser message
        message: String,
    },

    /// Remote call failed
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// Reconciliation failed
    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Get the error category for retry logic.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Remote(e) => e.category(),
            Self::Reconcile(e) => e.category(),
            Self::CorruptState { .. } | Self::Io(_) | Self::Json(_) => ErrorCategory::Invalid,
        }
    }

    /// Whether this error is typically transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }
}

/// Result type for cloud backend operations.
pub type Result<T> = std::result::Result<T, Error>;
