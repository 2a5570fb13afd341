//! Service facade: the seven registry operations.
//!
//! Each operation wraps validation, resolution, the mutation itself and
//! error translation. The plain functions take [`AppState`] so the test
//! suite can drive them without a transport; [`RegistryApi`] is the thin
//! tonic binding over them.

use crate::download::{handle_pull, PullStream};
use crate::error::ApiError;
use crate::proto;
use crate::proto::registry_service_server::RegistryService;
use crate::state::AppState;
use crate::upload::handle_upload;
use crate::validate::{self, Identifier};
use armory_core::{ArtifactQuery, QualifiedName, VersionHash};
use armory_metadata::ArtifactRecord;
use tonic::{Request, Response, Status, Streaming};

/// Resolve an identifier to the artifact record it names.
pub(crate) async fn resolve(
    state: &AppState,
    name: &QualifiedName,
    identifier: &Identifier,
) -> Result<ArtifactRecord, ApiError> {
    match identifier {
        Identifier::Hash(hash) => Ok(state.metadata.get_artifact_by_hash(name, hash).await?),
        Identifier::Tag(tag) => Ok(state.metadata.get_artifact_by_tag(name, tag).await?),
    }
}

/// Convert a metadata record into its wire representation.
pub(crate) fn to_proto_artifact(record: &ArtifactRecord) -> proto::Artifact {
    let artifact = &record.artifact;
    proto::Artifact {
        fqn: Some(proto::FullyQualifiedName {
            source: artifact.source.clone(),
            author: artifact.author.clone(),
            name: artifact.name.clone(),
        }),
        version_hash: artifact.version_hash.clone(),
        tags: record.tags.clone(),
        metadata: Some(proto::MetaData {
            created: Some(prost_types::Timestamp {
                seconds: artifact.created_at.unix_timestamp(),
                nanos: artifact.created_at.nanosecond() as i32,
            }),
            pulls: artifact.pulls_count,
        }),
    }
}

/// Enumerate artifacts matching a partial name.
pub async fn query_artifacts(
    state: &AppState,
    query: proto::ArtifactQuery,
) -> Result<proto::ArtifactListResponse, ApiError> {
    tracing::info!(
        source = ?query.source,
        author = ?query.author,
        name = ?query.name,
        "artifacts queried"
    );

    // Matches the facade contract: without a backend the registry answers
    // queries with an empty listing rather than an error.
    if state.storage.is_none() {
        return Ok(proto::ArtifactListResponse::default());
    }

    let domain_query = ArtifactQuery {
        source: query.source,
        author: query.author,
        name: query.name,
    };

    let records = state.metadata.query_artifacts(&domain_query).await?;
    Ok(proto::ArtifactListResponse {
        artifacts: records.iter().map(to_proto_artifact).collect(),
    })
}

/// Fetch an artifact record by hash or tag.
pub async fn get_artifact(
    state: &AppState,
    request: proto::ArtifactIdentifier,
) -> Result<proto::Artifact, ApiError> {
    let (name, identifier) = validate::parse_identifier(&request)?;

    tracing::info!(name = %name, "artifact record requested");

    let record = resolve(state, &name, &identifier).await?;
    Ok(to_proto_artifact(&record))
}

/// Delete an artifact: blob first, then the metadata row (tags cascade).
///
/// A failed blob delete aborts before metadata is touched; deleting the
/// metadata first would leave a dangling pointer to a missing blob.
pub async fn delete_artifact(
    state: &AppState,
    request: proto::ArtifactIdentifier,
) -> Result<proto::Artifact, ApiError> {
    let (name, identifier) = validate::parse_identifier(&request)?;

    tracing::info!(name = %name, "artifact deletion requested");

    let storage = state.storage("artifact deletion")?;

    let record = resolve(state, &name, &identifier).await?;
    let hash = VersionHash::from_hex(&record.artifact.version_hash)
        .map_err(|e| ApiError::Internal(format!("stored hash is corrupt: {e}")))?;

    storage.delete(&name, &hash).await?;
    state.metadata.delete_artifact(&name, &hash).await?;

    tracing::info!(name = %name, hash = %hash, "artifact deleted");

    Ok(to_proto_artifact(&record))
}

/// Point a tag at an artifact version; any previous mapping for the same
/// tag moves.
pub async fn add_tag(
    state: &AppState,
    request: proto::AddRemoveTagRequest,
) -> Result<proto::Artifact, ApiError> {
    let (name, hash, tag) = validate::parse_tag_request(&request)?;

    tracing::info!(name = %name, tag = %tag, "tag creation requested");

    state.metadata.add_tag(&name, &hash, &tag).await?;

    let record = state.metadata.get_artifact_by_hash(&name, &hash).await?;
    Ok(to_proto_artifact(&record))
}

/// Remove a tag mapping.
pub async fn remove_tag(
    state: &AppState,
    request: proto::AddRemoveTagRequest,
) -> Result<proto::Artifact, ApiError> {
    let (name, hash, tag) = validate::parse_tag_request(&request)?;

    tracing::info!(name = %name, tag = %tag, "tag removal requested");

    state.metadata.remove_tag(&name, &tag).await?;

    let record = state.metadata.get_artifact_by_hash(&name, &hash).await?;
    Ok(to_proto_artifact(&record))
}

/// tonic binding for the registry service.
pub struct RegistryApi {
    state: AppState,
}

impl RegistryApi {
    /// Create the service over injected backends.
    pub fn new(state: AppState) -> Self {
        Self { state }
    }
}

#[tonic::async_trait]
impl RegistryService for RegistryApi {
    async fn query_artifacts(
        &self,
        request: Request<proto::ArtifactQuery>,
    ) -> Result<Response<proto::ArtifactListResponse>, Status> {
        let response = query_artifacts(&self.state, request.into_inner()).await?;
        Ok(Response::new(response))
    }

    async fn get_artifact(
        &self,
        request: Request<proto::ArtifactIdentifier>,
    ) -> Result<Response<proto::Artifact>, Status> {
        let artifact = get_artifact(&self.state, request.into_inner()).await?;
        Ok(Response::new(artifact))
    }

    type PullArtifactStream = PullStream;

    async fn pull_artifact(
        &self,
        request: Request<proto::ArtifactIdentifier>,
    ) -> Result<Response<Self::PullArtifactStream>, Status> {
        let stream = handle_pull(&self.state, request.into_inner()).await?;
        Ok(Response::new(stream))
    }

    async fn upload_artifact(
        &self,
        request: Request<Streaming<proto::UploadArtifactRequest>>,
    ) -> Result<Response<proto::Artifact>, Status> {
        let artifact = handle_upload(&self.state, request.into_inner()).await?;
        Ok(Response::new(artifact))
    }

    async fn delete_artifact(
        &self,
        request: Request<proto::ArtifactIdentifier>,
    ) -> Result<Response<proto::Artifact>, Status> {
        let artifact = delete_artifact(&self.state, request.into_inner()).await?;
        Ok(Response::new(artifact))
    }

    async fn add_tag(
        &self,
        request: Request<proto::AddRemoveTagRequest>,
    ) -> Result<Response<proto::Artifact>, Status> {
        let artifact = add_tag(&self.state, request.into_inner()).await?;
        Ok(Response::new(artifact))
    }

    async fn remove_tag(
        &self,
        request: Request<proto::AddRemoveTagRequest>,
    ) -> Result<Response<proto::Artifact>, Status> {
        let artifact = remove_tag(&self.state, request.into_inner()).await?;
        Ok(Response::new(artifact))
    }
}
