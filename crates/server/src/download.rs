//! Server-streaming download pipeline.

use crate::error::ApiError;
use crate::proto;
use crate::service::resolve;
use crate::state::AppState;
use crate::validate;
use armory_core::{VersionHash, PULL_CHUNK_SIZE};
use futures::Stream;
use std::pin::Pin;
use tonic::Status;

/// Stream of pull chunks handed back to tonic.
pub type PullStream = Pin<Box<dyn Stream<Item = Result<proto::ArtifactContent, Status>> + Send>>;

/// Resolve an identifier, fetch the blob and stream it out in 3 MiB chunks.
///
/// The pull counter is bumped after the final chunk has been yielded; a
/// client that disconnects mid-stream drops the stream before the bump.
pub async fn handle_pull(
    state: &AppState,
    request: proto::ArtifactIdentifier,
) -> Result<PullStream, ApiError> {
    let (name, identifier) = validate::parse_identifier(&request)?;

    tracing::info!(name = %name, "artifact pull requested");

    let storage = state.storage("artifact pull")?.clone();

    let record = resolve(state, &name, &identifier).await?;
    let hash = VersionHash::from_hex(&record.artifact.version_hash)
        .map_err(|e| ApiError::Internal(format!("stored hash is corrupt: {e}")))?;

    let content = storage.get(&name, &hash).await?;
    let total = content.len();

    tracing::info!(
        name = %name,
        hash = %hash,
        total_size = total,
        chunk_size = PULL_CHUNK_SIZE,
        "streaming artifact content"
    );

    let metadata = state.metadata.clone();
    let stream = async_stream::stream! {
        let mut offset = 0;
        while offset < total {
            let end = usize::min(offset + PULL_CHUNK_SIZE, total);
            yield Ok(proto::ArtifactContent {
                data: content.slice(offset..end).to_vec(),
            });
            offset = end;
        }

        // Complete pull: bump the counter best-effort. Lost increments are
        // acceptable; a failed pull must not be.
        if let Err(e) = metadata.increment_pulls(&name, &hash).await {
            tracing::warn!(name = %name, hash = %hash, error = %e, "failed to increment pull count");
        }
    };

    Ok(Box::pin(stream))
}
