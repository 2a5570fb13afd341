//! API error types and RPC status translation.

use tonic::{Code, Status};

/// Facade-visible error type.
///
/// Internal layers use their own typed errors; this is the single place
/// where they are translated into an RPC status. Status messages are
/// human-readable and never carry stack traces.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    InvalidArgument(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("registry unavailable: {0}")]
    Unavailable(String),

    #[error("cancelled: {0}")]
    Canceled(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("storage error: {0}")]
    Storage(#[from] armory_storage::StorageError),

    #[error("metadata error: {0}")]
    Metadata(#[from] armory_metadata::MetadataError),
}

impl ApiError {
    /// Get the RPC status code for this error.
    pub fn code(&self) -> Code {
        match self {
            Self::InvalidArgument(_) => Code::InvalidArgument,
            Self::NotFound(_) => Code::NotFound,
            Self::AlreadyExists(_) => Code::AlreadyExists,
            Self::Unavailable(_) => Code::Unavailable,
            Self::Canceled(_) => Code::Cancelled,
            Self::Internal(_) => Code::Internal,
            Self::Storage(e) => match e {
                armory_storage::StorageError::NotFound(_) => Code::NotFound,
                _ => Code::Internal,
            },
            Self::Metadata(e) => match e {
                armory_metadata::MetadataError::NotFound(_) => Code::NotFound,
                armory_metadata::MetadataError::Conflict(_) => Code::AlreadyExists,
                armory_metadata::MetadataError::BadInput(_) => Code::InvalidArgument,
                armory_metadata::MetadataError::Database(_) => Code::Internal,
            },
        }
    }
}

impl From<ApiError> for Status {
    fn from(err: ApiError) -> Self {
        let code = err.code();
        match code {
            Code::Internal => tracing::error!(error = %err, "internal error"),
            _ => tracing::debug!(error = %err, code = ?code, "request failed"),
        }
        Status::new(code, err.to_string())
    }
}

/// Result type for facade operations.
pub type ApiResult<T> = std::result::Result<T, ApiError>;
