//! Domain error model.

use core::fmt::Display;

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Raised by aggregates and value objects when a request cannot be honoured
/// as asked: bad input, a broken invariant, a stale version. Storage and
/// provider failures have their own types in infra.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Rejected input (missing field, out of range, malformed).
    #[error("validation failed: {0}")]
    Validation(String),

    /// The requested change would leave an aggregate in an illegal state,
    /// e.g. reserving more stock than is on hand or reopening a cancelled order.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    #[error("invalid identifier: {0}")]
    InvalidId(String),

    #[error("not found")]
    NotFound,

    /// Duplicate slug or code, or a stale aggregate version.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("unauthorized")]
    Unauthorized,
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// `"<what> is required"`.
    pub fn required(what: &str) -> Self {
        Self::Validation(format!("{what} is required"))
    }

    /// `"<what> must be between <min> and <max>"`.
    pub fn out_of_range(what: &str, min: impl Display, max: impl Display) -> Self {
        Self::Validation(format!("{what} must be between {min} and {max}"))
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found() -> Self {
        Self::NotFound
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn helper_messages() {
        assert_eq!(
            DomainError::required("coupon code").to_string(),
            "validation failed: coupon code is required"
        );
        assert_eq!(
            DomainError::out_of_range("rating", 1, 5),
            DomainError::Validation("rating must be between 1 and 5".into())
        );
    }
}
