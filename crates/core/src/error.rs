//! Error types for the core domain.

use thiserror::Error;

/// Core domain error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid {field}: {reason}")]
    InvalidName {
        field: &'static str,
        reason: String,
    },

    #[error("invalid version hash: {0}")]
    InvalidHash(String),

    #[error("invalid duration: {0}")]
    InvalidDuration(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
