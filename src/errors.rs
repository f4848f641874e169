//! Crate-wide error type.

use thiserror::Error;

/// Errors raised by the store, the scripts and configuration loading.
#[derive(Debug, Error)]
pub enum KeeperError {
    /// Configuration could not be loaded or failed validation
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// The store could not be reached
    #[error("connection error: {0}")]
    ConnectionError(String),

    /// A query against the store failed
    #[error("database error: {0}")]
    DatabaseError(String),

    /// A persisted record could not be decoded
    #[error("invalid record: {0}")]
    InvalidRecord(String),

    /// The requested record does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// User-supplied input was rejected
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

pub type KeeperResult<T> = Result<T, KeeperError>;

impl From<sqlx::Error> for KeeperError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                KeeperError::ConnectionError(err.to_string())
            }
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                KeeperError::InvalidRecord(err.to_string())
            }
            other => KeeperError::DatabaseError(other.to_string()),
        }
    }
}

impl From<crate::validation::ValidationError> for KeeperError {
    fn from(err: crate::validation::ValidationError) -> Self {
        KeeperError::InvalidInput(err.to_string())
    }
}
