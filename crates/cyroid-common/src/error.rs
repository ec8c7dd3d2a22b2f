//! Unified error taxonomy for the Cyroid workspace.
//!
//! Every higher-level crate defines its own domain-specific error enum and
//! wraps these common variants via `#[from]` where appropriate, so a single
//! `CyroidError` can flow all the way up to a facade caller.

use thiserror::Error;

/// Top-level error type shared across the workspace.
///
/// Variants map onto the error taxonomy: Validation, Authorization,
/// NotFound, Conflict, Transient, Unrecoverable.
#[derive(Debug, Error)]
pub enum CyroidError {
    /// A value failed a domain validation rule (bad CIDR, duplicate
    /// hostname, illegal state transition, etc).
    #[error("validation failed: {message}")]
    Validation {
        /// Description of the violated rule.
        message: String,
    },

    /// The principal lacks the role, tag, or ownership required.
    #[error("forbidden: {message}")]
    Forbidden {
        /// Description of the denied operation.
        message: String,
    },

    /// A required resource was not found.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Type of the missing resource.
        kind: &'static str,
        /// Identifier of the missing resource.
        id: String,
    },

    /// The requested operation conflicts with existing state.
    #[error("conflict: {message}")]
    Conflict {
        /// Description of the conflicting state.
        message: String,
    },

    /// A transient runtime failure (engine unreachable, HTTP timeout).
    #[error("transient runtime error: {message}")]
    Transient {
        /// Description of the failure.
        message: String,
    },

    /// An unrecoverable runtime failure requiring operator intervention.
    #[error("unrecoverable runtime error: {message}")]
    Unrecoverable {
        /// Description of the failure.
        message: String,
    },

    /// An I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: std::path::PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Serialization or deserialization failed.
    #[error("serialization error: {source}")]
    Serialization {
        /// Underlying serialization error.
        #[from]
        source: serde_json::Error,
    },
}

impl CyroidError {
    /// Shorthand constructor for a validation error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Shorthand constructor for a forbidden error.
    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden {
            message: message.into(),
        }
    }

    /// Shorthand constructor for a not-found error.
    #[must_use]
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Shorthand constructor for a conflict error.
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// Shorthand constructor for a transient runtime error.
    #[must_use]
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient {
            message: message.into(),
        }
    }

    /// Shorthand constructor for an unrecoverable runtime error.
    #[must_use]
    pub fn unrecoverable(message: impl Into<String>) -> Self {
        Self::Unrecoverable {
            message: message.into(),
        }
    }

    /// Whether this error should be journaled against the owning entity
    /// per the propagation rule in the error handling design: validation
    /// and authorization errors are surfaced but not journaled.
    #[must_use]
    pub const fn should_journal(&self) -> bool {
        !matches!(self, Self::Validation { .. } | Self::Forbidden { .. })
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, CyroidError>;
