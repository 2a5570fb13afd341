//! Blob storage abstraction and backends for Armory.
//!
//! This crate provides:
//! - Content-addressed artifact storage keyed by `(qualified name, hash)`
//! - Single-pass streamed writes that hash while persisting
//! - Backends: local filesystem, S3-compatible, and in-memory (testing)

pub mod backends;
pub mod error;
pub mod traits;

pub use backends::{filesystem::FilesystemStore, memory::MemoryStore, s3::S3Store};
pub use error::{StorageError, StorageResult};
pub use traits::{ArtifactStore, ByteStream};

use armory_core::AppConfig;
use std::sync::Arc;

/// Create an artifact store from configuration.
///
/// `persistence.type` selects the backend. Unknown values fall back to the
/// filesystem backend with a warning rather than failing startup.
pub async fn from_config(config: &AppConfig) -> StorageResult<Arc<dyn ArtifactStore>> {
    match config.persistence.kind.as_str() {
        "filesystem" => {
            let backend = FilesystemStore::new(&config.storage_dir).await?;
            Ok(Arc::new(backend))
        }
        "s3" => {
            let s3_config = config.persistence.s3.as_ref().ok_or_else(|| {
                StorageError::Config(
                    "persistence.type is \"s3\" but no [persistence.s3] section is present"
                        .to_string(),
                )
            })?;
            let backend = S3Store::new(s3_config)?;
            Ok(Arc::new(backend))
        }
        other => {
            tracing::warn!(
                persistence_type = other,
                "unknown persistence type, falling back to filesystem backend"
            );
            let backend = FilesystemStore::new(&config.storage_dir).await?;
            Ok(Arc::new(backend))
        }
    }
}
