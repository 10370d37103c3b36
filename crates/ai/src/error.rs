use thiserror::Error;

#[derive(Debug, Error)]
pub enum AiError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// No provider configured.
    #[error("chat service unavailable: {0}")]
    Unavailable(String),

    #[error("inference failed: {0}")]
    InferenceFailed(String),

    /// A tool's data source failed.
    #[error("backend error: {0}")]
    Backend(String),
}
