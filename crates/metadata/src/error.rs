//! Metadata store error types.

use thiserror::Error;

/// Metadata store operation errors.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("bad input: {0}")]
    BadInput(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Result type for metadata operations.
pub type MetadataResult<T> = std::result::Result<T, MetadataError>;

/// Translate an sqlx error, surfacing unique-key violations as conflicts.
pub(crate) fn translate(err: sqlx::Error, context: &str) -> MetadataError {
    if let sqlx::Error::Database(ref db_err) = err {
        if db_err.is_unique_violation() {
            return MetadataError::Conflict(context.to_string());
        }
    }
    MetadataError::Database(err)
}
