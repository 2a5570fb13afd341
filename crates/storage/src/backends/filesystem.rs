//! Local filesystem storage backend.

use crate::error::{StorageError, StorageResult};
use crate::traits::{ArtifactStore, ByteStream};
use armory_core::{QualifiedName, VersionHash};
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::instrument;
use uuid::Uuid;

/// Name of the staging directory for in-flight uploads, kept under the
/// storage root. Uploads land here until their content hash is known.
const UPLOADS_DIR: &str = "uploads";

/// Local filesystem artifact store.
///
/// Blobs live at `<root>/<source>/<author>/<name>/<hash>.wasm`. Uploads are
/// first written to a uniquely named temp file under the uploads directory
/// and atomically renamed into place once the content hash is known.
#[derive(Debug)]
pub struct FilesystemStore {
    root: PathBuf,
    uploads: PathBuf,
}

impl FilesystemStore {
    /// Create a new filesystem store rooted at `root`.
    pub async fn new(root: impl AsRef<Path>) -> StorageResult<Self> {
        let root = root.as_ref().to_path_buf();
        let uploads = root.join(UPLOADS_DIR);
        fs::create_dir_all(&uploads).await?;
        Ok(Self { root, uploads })
    }

    /// Path of the final blob for a key.
    fn blob_path(&self, name: &QualifiedName, hash: &VersionHash) -> PathBuf {
        // Components are validated by QualifiedName to contain no path
        // separators, so a plain join cannot escape the root.
        self.root
            .join(name.source())
            .join(name.author())
            .join(name.name())
            .join(format!("{}.wasm", hash.to_hex()))
    }

    /// Allocate a unique temp path, verifying it stays inside the uploads
    /// directory.
    fn temp_path(&self) -> StorageResult<PathBuf> {
        let uploads = self.uploads.canonicalize().map_err(|e| {
            StorageError::Io(std::io::Error::new(
                e.kind(),
                format!("failed to canonicalize uploads dir: {e}"),
            ))
        })?;
        let temp = uploads.join(format!("{}.tmp", Uuid::new_v4()));
        if !temp.starts_with(&uploads) {
            return Err(StorageError::InvalidKey(format!(
                "temp path escapes uploads directory: {}",
                temp.display()
            )));
        }
        Ok(temp)
    }

    async fn store_inner(
        &self,
        name: &QualifiedName,
        mut content: ByteStream,
        temp_path: &Path,
    ) -> StorageResult<VersionHash> {
        let mut file = fs::File::create(temp_path).await?;
        let mut hasher = VersionHash::hasher();

        while let Some(chunk) = content.next().await {
            let chunk = chunk?;
            hasher.update(&chunk);
            file.write_all(&chunk).await?;
        }

        // Flush to disk before the rename so a crash cannot leave a final
        // path pointing at unwritten data.
        file.sync_all().await?;
        drop(file);

        let hash = hasher.finalize();
        let final_path = self.blob_path(name, &hash);
        if let Some(parent) = final_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::rename(temp_path, &final_path).await?;

        Ok(hash)
    }
}

#[async_trait]
impl ArtifactStore for FilesystemStore {
    #[instrument(skip(self, content), fields(backend = "filesystem", name = %name))]
    async fn store(
        &self,
        name: &QualifiedName,
        content: ByteStream,
    ) -> StorageResult<VersionHash> {
        fs::create_dir_all(&self.uploads).await?;
        let temp_path = self.temp_path()?;

        let result = self.store_inner(name, content, &temp_path).await;
        if result.is_err() {
            let _ = fs::remove_file(&temp_path).await;
        }
        result
    }

    #[instrument(skip(self), fields(backend = "filesystem", name = %name, hash = %hash))]
    async fn get(&self, name: &QualifiedName, hash: &VersionHash) -> StorageResult<Bytes> {
        let path = self.blob_path(name, hash);
        let data = fs::read(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::NotFound(name.blob_key(hash))
            } else {
                StorageError::Io(e)
            }
        })?;
        Ok(Bytes::from(data))
    }

    #[instrument(skip(self), fields(backend = "filesystem", name = %name, hash = %hash))]
    async fn delete(&self, name: &QualifiedName, hash: &VersionHash) -> StorageResult<()> {
        let path = self.blob_path(name, hash);
        fs::remove_file(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::NotFound(name.blob_key(hash))
            } else {
                StorageError::Io(e)
            }
        })?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "filesystem"
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn health_check(&self) -> StorageResult<()> {
        let metadata = fs::metadata(&self.root).await.map_err(|e| {
            StorageError::Io(std::io::Error::new(
                e.kind(),
                format!("storage root not accessible: {e}"),
            ))
        })?;

        if !metadata.is_dir() {
            return Err(StorageError::Io(std::io::Error::other(format!(
                "storage root is not a directory: {:?}",
                self.root
            ))));
        }

        Ok(())
    }
}
