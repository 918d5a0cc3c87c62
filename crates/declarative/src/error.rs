//! Error types for reconciliation.
//!
//! Remote failures are classified so callers can decide what to do next:
//! transient failures are safe to retry (reconciliation is idempotent),
//! rejections are fatal for the pass, and "not found" never escapes the
//! observation step.

use crate::identity::ResourceIdentity;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Categories of reconciliation errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Resource does not exist
    NotFound,
    /// A parent resource is missing
    MissingDependency,
    /// Timeout, throttling, unavailability (retryable)
    Transient,
    /// The provider refused the request
    Rejected,
    /// Cooperative stop requested by the caller
    Cancelled,
    /// The configuration cannot be acted on as written
    Invalid,
}

impl ErrorCategory {
    /// Whether retrying the same reconcile call may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient)
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::NotFound => "Resource not found",
            Self::MissingDependency => "Missing dependency",
            Self::Transient => "Transient remote failure",
            Self::Rejected => "Rejected by provider",
            Self::Cancelled => "Cancelled",
            Self::Invalid => "Invalid configuration",
        }
    }

    /// Actionable advice for this category
    pub fn advice(&self) -> &'static str {
        match self {
            Self::NotFound => "No action needed - absence is a valid state",
            Self::MissingDependency => "Declare and converge the parent resource first",
            Self::Transient => "Retry the same reconciliation; it is safe to repeat",
            Self::Rejected => "Fix the configuration value the provider rejected",
            Self::Cancelled => "Re-run to finish; writes already issued were kept",
            Self::Invalid => "Set the missing attribute in the configuration",
        }
    }
}

/// Errors returned by a remote resource client
#[derive(Debug, Clone, Error)]
pub enum RemoteError {
    /// Resource (or its container) does not exist
    #[error("{code}: {message}")]
    NotFound {
        /// Provider error code, e.g. `ResourceGroupNotFound`
        code: String,
        message: String,
    },

    /// Timeouts and connection failures
    #[error("transient failure: {message}")]
    Transient { message: String },

    /// Rate limiting
    #[error("throttled: {message}")]
    Throttled {
        message: String,
        retry_after: Option<Duration>,
    },

    /// Validation failure or conflict reported by the provider
    #[error("{code}: {message}")]
    Rejected { code: String, message: String },

    /// The call observed the cancellation token and stopped
    #[error("operation cancelled")]
    Cancelled,
}

impl RemoteError {
    pub fn not_found(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::NotFound {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn rejected(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Rejected {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::Transient { .. } | Self::Throttled { .. } => ErrorCategory::Transient,
            Self::Rejected { .. } => ErrorCategory::Rejected,
            Self::Cancelled => ErrorCategory::Cancelled,
        }
    }

    /// Whether this is the provider's "not found" signal
    ///
    /// Providers report missing resources with codes ending in `NotFound`
    /// (`ResourceNotFound`, `ResourceGroupNotFound`, ...).
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound { .. } => true,
            Self::Rejected { code, .. } => code.ends_with("NotFound"),
            _ => false,
        }
    }
}

/// Step of a reconciliation pass an error happened in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Observe,
    Create,
    Update,
    Delete,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Observe => "observe",
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        })
    }
}

/// Errors that end a reconciliation pass for one resource
#[derive(Debug, Clone, Error)]
pub enum ReconcileError {
    /// A child references a parent that does not exist
    #[error("{resource} requires {dependency}, which does not exist")]
    MissingDependency {
        resource: ResourceIdentity,
        dependency: ResourceIdentity,
    },

    /// The remote client failed during a step
    #[error("{step} {resource} failed: {source}")]
    Remote {
        resource: ResourceIdentity,
        step: Step,
        #[source]
        source: RemoteError,
    },

    /// Cancellation was requested before a mutating step
    #[error("cancelled before {step} {resource} ({} write(s) already issued)", .issued.len())]
    Cancelled {
        resource: ResourceIdentity,
        step: Step,
        /// Summaries of writes issued earlier in the pass
        issued: Vec<String>,
    },

    /// The configuration cannot be reconciled as written
    #[error("{resource}: {reason}")]
    Invalid {
        resource: ResourceIdentity,
        reason: String,
    },
}

impl ReconcileError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::MissingDependency { .. } => ErrorCategory::MissingDependency,
            // A not-found while mutating means the provider refused the write
            Self::Remote { source, .. } => match source.category() {
                ErrorCategory::NotFound => ErrorCategory::Rejected,
                other => other,
            },
            Self::Cancelled { .. } => ErrorCategory::Cancelled,
            Self::Invalid { .. } => ErrorCategory::Invalid,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }

    pub fn is_cancelled(&self) -> bool {
        self.category() == ErrorCategory::Cancelled
    }

    /// The resource the failed pass was reconciling
    pub fn resource(&self) -> &ResourceIdentity {
        match self {
            Self::MissingDependency { resource, .. }
            | Self::Remote { resource, .. }
            | Self::Cancelled { resource, .. }
            | Self::Invalid { resource, .. } => resource,
        }
    }
}
