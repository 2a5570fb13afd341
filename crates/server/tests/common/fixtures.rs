//! Test fixtures: state builders, message builders and deterministic data.

use armory_metadata::{MetadataStore, SqliteStore};
use armory_server::proto;
use armory_server::{ApiError, AppState};
use armory_storage::MemoryStore;
use bytes::Bytes;
use futures::StreamExt;
use std::sync::Arc;
use tonic::Status;

/// Default chunk size used when splitting upload content in tests.
pub const UPLOAD_CHUNK_SIZE: usize = 64 * 1024;

/// Build an app state over the in-memory storage backend and an in-memory
/// SQLite metadata store. The concrete storage handle is returned alongside
/// so tests can assert on blob-level state.
pub async fn build_state() -> (AppState, Arc<MemoryStore>) {
    let storage = Arc::new(MemoryStore::new());
    let metadata: Arc<dyn MetadataStore> =
        Arc::new(SqliteStore::in_memory().await.expect("metadata store"));
    let state = AppState::new(Some(storage.clone()), metadata);
    (state, storage)
}

/// Build an app state with no storage backend configured.
pub async fn build_state_without_storage() -> AppState {
    let metadata: Arc<dyn MetadataStore> =
        Arc::new(SqliteStore::in_memory().await.expect("metadata store"));
    AppState::new(None, metadata)
}

/// Generate deterministic test data based on a seed.
#[allow(dead_code)]
pub fn seeded_bytes(seed: u64, len: usize) -> Bytes {
    let mut data = vec![0u8; len];
    let mut state = seed;

    for chunk in data.chunks_mut(8) {
        // Simple LCG for deterministic data
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
        let bytes = state.to_le_bytes();
        for (i, byte) in chunk.iter_mut().enumerate() {
            *byte = bytes[i % 8];
        }
    }

    Bytes::from(data)
}

/// Compute SHA-256 of data as a lowercase hex string.
#[allow(dead_code)]
pub fn sha256_hex(data: &[u8]) -> String {
    armory_core::VersionHash::compute(data).to_hex()
}

pub fn fqn(source: &str, author: &str, name: &str) -> proto::FullyQualifiedName {
    proto::FullyQualifiedName {
        source: source.to_string(),
        author: author.to_string(),
        name: name.to_string(),
    }
}

#[allow(dead_code)]
pub fn hash_id(fqn: proto::FullyQualifiedName, hash: &str) -> proto::ArtifactIdentifier {
    proto::ArtifactIdentifier {
        fqn: Some(fqn),
        identifier: Some(proto::artifact_identifier::Identifier::VersionHash(
            hash.to_string(),
        )),
    }
}

#[allow(dead_code)]
pub fn tag_id(fqn: proto::FullyQualifiedName, tag: &str) -> proto::ArtifactIdentifier {
    proto::ArtifactIdentifier {
        fqn: Some(fqn),
        identifier: Some(proto::artifact_identifier::Identifier::Tag(tag.to_string())),
    }
}

/// Build the message sequence of an upload: one metadata message followed by
/// content chunks.
pub fn upload_messages(
    fqn: proto::FullyQualifiedName,
    tags: &[&str],
    content: &[u8],
    chunk_size: usize,
) -> Vec<Result<proto::UploadArtifactRequest, Status>> {
    let mut messages = vec![Ok(proto::UploadArtifactRequest {
        payload: Some(proto::upload_artifact_request::Payload::Metadata(
            proto::ArtifactMetadata {
                fqn: Some(fqn),
                tags: tags.iter().map(|t| t.to_string()).collect(),
            },
        )),
    })];
    for chunk in content.chunks(chunk_size.max(1)) {
        messages.push(Ok(proto::UploadArtifactRequest {
            payload: Some(proto::upload_artifact_request::Payload::Content(
                proto::ArtifactContent {
                    data: chunk.to_vec(),
                },
            )),
        }));
    }
    messages
}

/// Drive the upload pipeline with the given content.
pub async fn upload(
    state: &AppState,
    fqn: proto::FullyQualifiedName,
    tags: &[&str],
    content: &[u8],
) -> Result<proto::Artifact, ApiError> {
    let messages = upload_messages(fqn, tags, content, UPLOAD_CHUNK_SIZE);
    armory_server::upload::handle_upload(state, futures::stream::iter(messages)).await
}

/// Drive the pull pipeline and collect the chunk sizes plus the reassembled
/// content.
#[allow(dead_code)]
pub async fn pull(
    state: &AppState,
    id: proto::ArtifactIdentifier,
) -> Result<(Vec<usize>, Vec<u8>), ApiError> {
    let mut stream = armory_server::download::handle_pull(state, id).await?;

    let mut sizes = Vec::new();
    let mut content = Vec::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.expect("pull chunk");
        sizes.push(chunk.data.len());
        content.extend_from_slice(&chunk.data);
    }
    Ok((sizes, content))
}
