//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Every variant is a deterministic rejection that is surfaced to the caller.
/// Infrastructure failures (broker, cache, store unreachable) belong elsewhere.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Malformed input. Carries the first violated constraint.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Role or ownership mismatch.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// A referenced entity does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// The subscription snapshot needed for admission control is unknown
    /// (the cache has not caught up yet). Retryable.
    #[error("subscription unavailable: {0}")]
    QuotaUnavailable(String),

    /// Admission control rejected the operation because a plan limit is reached.
    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),

    /// Uniqueness or optimistic-concurrency conflict.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A state-machine rule was violated.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn permission_denied(msg: impl Into<String>) -> Self {
        Self::PermissionDenied(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn quota_unavailable(msg: impl Into<String>) -> Self {
        Self::QuotaUnavailable(msg.into())
    }

    pub fn quota_exceeded(msg: impl Into<String>) -> Self {
        Self::QuotaExceeded(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    /// Stable machine-readable code, used by the HTTP layer.
    pub fn code(&self) -> &'static str {
        match self {
            DomainError::Validation(_) => "validation_error",
            DomainError::PermissionDenied(_) => "permission_denied",
            DomainError::NotFound(_) => "not_found",
            DomainError::QuotaUnavailable(_) => "quota_unavailable",
            DomainError::QuotaExceeded(_) => "quota_exceeded",
            DomainError::Conflict(_) => "conflict",
            DomainError::InvariantViolation(_) => "invariant_violation",
            DomainError::InvalidId(_) => "invalid_id",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_context() {
        assert_eq!(
            DomainError::not_found("job").to_string(),
            "job not found"
        );
        assert_eq!(
            DomainError::quota_exceeded("job post limit (3) reached").to_string(),
            "quota exceeded: job post limit (3) reached"
        );
    }

    #[test]
    fn codes_are_stable() {
        assert_eq!(DomainError::validation("x").code(), "validation_error");
        assert_eq!(DomainError::quota_unavailable("x").code(), "quota_unavailable");
        assert_eq!(DomainError::conflict("x").code(), "conflict");
    }
}
