//! Common error types and handling for Sunday

/// Common result type
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for the Sunday application
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Unexpected error: {0}")]
    Unexpected(#[from] anyhow::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether the error comes from a dependency outage rather than caller input
    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            Error::Unexpected(_) | Error::Database(_) | Error::Internal(_)
        )
    }
}
