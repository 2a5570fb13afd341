//! Storage error types.

use thiserror::Error;

/// Storage operation errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("artifact not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("S3 error: {0}")]
    S3(#[from] Box<dyn std::error::Error + Send + Sync>),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("upload interrupted: {0}")]
    Interrupted(String),

    #[error("operation timed out after {0:?}")]
    Timeout(std::time::Duration),
}

/// Result type for storage operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;
