//! Storage trait definitions.

use crate::error::StorageResult;
use armory_core::{QualifiedName, VersionHash};
use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;

/// A boxed stream of bytes for streaming writes.
pub type ByteStream = Pin<Box<dyn Stream<Item = StorageResult<Bytes>> + Send>>;

/// Blob store abstraction for content-addressed artifact storage.
///
/// Objects are keyed by `(qualified name, version hash)`; the hash is the
/// SHA-256 of the stored bytes and is computed by the backend itself while
/// the content streams through [`store`](ArtifactStore::store).
#[async_trait]
pub trait ArtifactStore: Send + Sync + std::fmt::Debug + 'static {
    /// Consume `content` to completion, persisting the bytes and hashing them
    /// in a single pass.
    ///
    /// On success the object is durable and readable under the key derived
    /// from the returned hash. On any error no partial object is left visible
    /// under a final key and transient upload state has been removed.
    async fn store(
        &self,
        name: &QualifiedName,
        content: ByteStream,
    ) -> StorageResult<VersionHash>;

    /// Fetch the full content of an artifact.
    ///
    /// Returns [`StorageError::NotFound`](crate::StorageError::NotFound) when
    /// the object is absent, distinct from transport or I/O failures.
    async fn get(&self, name: &QualifiedName, hash: &VersionHash) -> StorageResult<Bytes>;

    /// Remove an artifact.
    ///
    /// Returns [`StorageError::NotFound`](crate::StorageError::NotFound) when
    /// the object is absent.
    async fn delete(&self, name: &QualifiedName, hash: &VersionHash) -> StorageResult<()>;

    /// Static identifier for the backend type, used in logs.
    fn backend_name(&self) -> &'static str;

    /// Verify backend connectivity.
    ///
    /// Called during server startup so misconfiguration surfaces before the
    /// first request. The default implementation succeeds, suitable for
    /// backends without a remote dependency.
    async fn health_check(&self) -> StorageResult<()> {
        Ok(())
    }
}
