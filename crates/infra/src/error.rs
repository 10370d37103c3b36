//! Infrastructure error types.

use thiserror::Error;

use storefront_core::DomainError;

/// Storage failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    /// A uniqueness constraint or version check failed.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The row to update or delete does not exist.
    #[error("not found")]
    NotFound,

    /// A stored document could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The record handed to the store is unusable (e.g. an aggregate that was
    /// never created).
    #[error("invalid record: {0}")]
    Invalid(String),

    /// Connection, query or lock failure.
    #[error("storage backend error: {0}")]
    Backend(String),
}

pub type RepoResult<T> = Result<T, RepositoryError>;

impl From<serde_json::Error> for RepositoryError {
    fn from(value: serde_json::Error) -> Self {
        RepositoryError::Serialization(value.to_string())
    }
}

impl From<RepositoryError> for DomainError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::Conflict(msg) => DomainError::Conflict(msg),
            RepositoryError::NotFound => DomainError::NotFound,
            other => DomainError::InvariantViolation(other.to_string()),
        }
    }
}

/// Map sqlx errors onto repository errors.
///
/// Unique violations (`23505`) surface as conflicts so callers can report a
/// duplicate slug/code or retry a lost optimistic-concurrency race.
pub(crate) fn map_sqlx_error(operation: &str, err: sqlx::Error) -> RepositoryError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {operation}: {}", db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => RepositoryError::Conflict(
                    db_err
                        .constraint()
                        .map(|c| format!("duplicate value violates {c}"))
                        .unwrap_or(msg),
                ),
                _ => RepositoryError::Backend(msg),
            }
        }
        sqlx::Error::RowNotFound => RepositoryError::NotFound,
        other => RepositoryError::Backend(format!("{operation}: {other}")),
    }
}

/// Failure talking to a third-party service.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IntegrationError {
    /// The integration has no credentials configured.
    #[error("{0} is not configured")]
    Disabled(&'static str),

    /// The request was rejected before it was sent.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The provider answered with an error status.
    #[error("{provider} returned {status}: {message}")]
    Provider {
        provider: &'static str,
        status: u16,
        message: String,
    },

    /// Network or decoding failure.
    #[error("{provider} transport error: {message}")]
    Transport { provider: &'static str, message: String },
}

impl IntegrationError {
    pub(crate) fn transport(provider: &'static str, err: reqwest::Error) -> Self {
        IntegrationError::Transport {
            provider,
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repository_errors_map_to_domain_errors() {
        assert_eq!(
            DomainError::from(RepositoryError::Conflict("slug".into())),
            DomainError::Conflict("slug".into())
        );
        assert_eq!(DomainError::from(RepositoryError::NotFound), DomainError::NotFound);
        assert!(matches!(
            DomainError::from(RepositoryError::Backend("down".into())),
            DomainError::InvariantViolation(_)
        ));
    }

    #[test]
    fn row_not_found_is_not_found() {
        assert_eq!(map_sqlx_error("get", sqlx::Error::RowNotFound), RepositoryError::NotFound);
    }
}
