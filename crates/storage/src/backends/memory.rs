//! In-memory storage backend.

use crate::error::{StorageError, StorageResult};
use crate::traits::{ArtifactStore, ByteStream};
use armory_core::{QualifiedName, VersionHash};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::instrument;

/// In-memory artifact store.
///
/// Behaves exactly like the durable backends (single-pass hashing, typed
/// NotFound, content-addressed keys) so it can stand in for them in tests.
#[derive(Default, Debug)]
pub struct MemoryStore {
    artifacts: RwLock<HashMap<String, Bytes>>,
}

impl MemoryStore {
    /// Create an empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored blobs.
    pub fn len(&self) -> usize {
        self.artifacts.read().expect("lock poisoned").len()
    }

    /// True when no blobs are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ArtifactStore for MemoryStore {
    #[instrument(skip(self, content), fields(backend = "memory", name = %name))]
    async fn store(
        &self,
        name: &QualifiedName,
        mut content: ByteStream,
    ) -> StorageResult<VersionHash> {
        let mut buffer = BytesMut::new();
        let mut hasher = VersionHash::hasher();

        while let Some(chunk) = content.next().await {
            let chunk = chunk?;
            hasher.update(&chunk);
            buffer.extend_from_slice(&chunk);
        }

        let hash = hasher.finalize();
        let key = name.blob_key(&hash);
        self.artifacts
            .write()
            .expect("lock poisoned")
            .insert(key, buffer.freeze());

        Ok(hash)
    }

    #[instrument(skip(self), fields(backend = "memory", name = %name, hash = %hash))]
    async fn get(&self, name: &QualifiedName, hash: &VersionHash) -> StorageResult<Bytes> {
        let key = name.blob_key(hash);
        self.artifacts
            .read()
            .expect("lock poisoned")
            .get(&key)
            .cloned()
            .ok_or(StorageError::NotFound(key))
    }

    #[instrument(skip(self), fields(backend = "memory", name = %name, hash = %hash))]
    async fn delete(&self, name: &QualifiedName, hash: &VersionHash) -> StorageResult<()> {
        let key = name.blob_key(hash);
        match self.artifacts.write().expect("lock poisoned").remove(&key) {
            Some(_) => Ok(()),
            None => Err(StorageError::NotFound(key)),
        }
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
