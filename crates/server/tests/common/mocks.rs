//! Failure-injecting wrappers around the real stores.

use armory_core::{ArtifactQuery, QualifiedName, VersionHash};
use armory_metadata::{ArtifactRecord, MetadataError, MetadataResult, MetadataStore};
use async_trait::async_trait;
use std::sync::Arc;

/// Delegates to a real metadata store but fails every `create_artifact`
/// call. Used to exercise the upload commit compensation path.
pub struct FailingCreateMetadata {
    inner: Arc<dyn MetadataStore>,
}

impl FailingCreateMetadata {
    #[allow(dead_code)]
    pub fn new(inner: Arc<dyn MetadataStore>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl MetadataStore for FailingCreateMetadata {
    async fn migrate(&self) -> MetadataResult<()> {
        self.inner.migrate().await
    }

    async fn health_check(&self) -> MetadataResult<()> {
        self.inner.health_check().await
    }

    async fn get_artifact_by_hash(
        &self,
        name: &QualifiedName,
        hash: &VersionHash,
    ) -> MetadataResult<ArtifactRecord> {
        self.inner.get_artifact_by_hash(name, hash).await
    }

    async fn get_artifact_by_tag(
        &self,
        name: &QualifiedName,
        tag: &str,
    ) -> MetadataResult<ArtifactRecord> {
        self.inner.get_artifact_by_tag(name, tag).await
    }

    async fn query_artifacts(&self, query: &ArtifactQuery) -> MetadataResult<Vec<ArtifactRecord>> {
        self.inner.query_artifacts(query).await
    }

    async fn create_artifact(
        &self,
        _name: &QualifiedName,
        _hash: &VersionHash,
        _tags: &[String],
    ) -> MetadataResult<()> {
        Err(MetadataError::Conflict("injected commit failure".to_string()))
    }

    async fn delete_artifact(
        &self,
        name: &QualifiedName,
        hash: &VersionHash,
    ) -> MetadataResult<()> {
        self.inner.delete_artifact(name, hash).await
    }

    async fn add_tag(
        &self,
        name: &QualifiedName,
        hash: &VersionHash,
        tag: &str,
    ) -> MetadataResult<()> {
        self.inner.add_tag(name, hash, tag).await
    }

    async fn remove_tag(&self, name: &QualifiedName, tag: &str) -> MetadataResult<()> {
        self.inner.remove_tag(name, tag).await
    }

    async fn increment_pulls(
        &self,
        name: &QualifiedName,
        hash: &VersionHash,
    ) -> MetadataResult<()> {
        self.inner.increment_pulls(name, hash).await
    }
}
