//! Error taxonomy for the Claude-Slack core broker.
//!
//! One flat enum shared across every crate in the workspace. Lower layers
//! (`claude-slack-db`, `claude-slack-search`) define narrower error types and
//! convert into this one at the crate boundary, so a caller of the façade
//! only ever sees this enum.

use thiserror::Error;

/// Result type alias used throughout the broker.
pub type Result<T> = std::result::Result<T, Error>;

/// Error kinds raised by the broker's public surface.
///
/// Every public method documents which of these it may raise. `Unavailable`
/// is retried with bounded backoff inside the façade before it ever reaches
/// a caller; the rest surface unchanged.
#[derive(Debug, Error)]
pub enum Error {
    /// The referenced entity does not exist (or is not visible to the caller).
    #[error("not found: {0}")]
    NotFound(String),

    /// A unique constraint would be violated (duplicate name, membership, etc).
    #[error("conflict: {0}")]
    Conflict(String),

    /// A permission query rejected the operation outright.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// DM policy (closed/restricted/blocked) forbids the operation.
    #[error("policy denied: {0}")]
    PolicyDenied(String),

    /// Caller-supplied argument is malformed, out of range, or the wrong shape.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Filter tree failed to parse, exceeded the depth guard, or used an
    /// unknown operator.
    #[error("filter error: {0}")]
    FilterError(String),

    /// A transient backend failure (lock contention, connection pool
    /// exhaustion, vector backend timeout). Retryable.
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// A structural invariant was violated. Not retryable; indicates a bug
    /// or data corruption rather than caller error.
    #[error("integrity violation: {0}")]
    Integrity(String),

    /// The caller's cancellation signal fired before the operation finished.
    #[error("cancelled")]
    Cancelled,

    /// The caller's deadline elapsed before the operation finished.
    #[error("deadline exceeded")]
    DeadlineExceeded,
}

impl From<crate::filter::FilterParseError> for Error {
    fn from(e: crate::filter::FilterParseError) -> Self {
        Self::FilterError(e.to_string())
    }
}

impl Error {
    /// Whether the façade's retry loop should retry this error.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }

    /// Shorthand for a `NotFound` with a formatted message.
    pub fn not_found(what: impl std::fmt::Display) -> Self {
        Self::NotFound(what.to_string())
    }

    /// Shorthand for a `PermissionDenied` naming the violated rule, per
    /// spec.md §7: "one sentence naming the rule violated".
    pub fn permission_denied(rule: impl std::fmt::Display) -> Self {
        Self::PermissionDenied(rule.to_string())
    }
}
