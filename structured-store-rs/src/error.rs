use thiserror::Error;

/// Errors raised by structured store operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// The statement is not a single read-only SELECT
    #[error("{0}")]
    UnauthorizedQuery(String),

    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
