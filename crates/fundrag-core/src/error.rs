use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Dimension mismatch: {documents} documents but {embeddings} embeddings")]
    DimensionMismatch { documents: usize, embeddings: usize },

    #[error("{service} unavailable: {reason}")]
    ServiceUnavailable { service: &'static str, reason: String },

    #[error("Index state corrupted: {0}")]
    StateCorruption(String),

    #[error("Index error: {0}")]
    Index(String),

    #[error("Query timed out after {0:?}")]
    Timeout(Duration),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Operation failed: {0}")]
    Operation(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn unavailable(service: &'static str, reason: impl ToString) -> Self {
        Self::ServiceUnavailable { service, reason: reason.to_string() }
    }

    /// Malformed input and bad configuration fail fast; only transport-level
    /// failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ServiceUnavailable { .. } | Self::Timeout(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
