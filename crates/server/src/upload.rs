//! Client-streaming upload pipeline.
//!
//! The first stream message carries metadata, the rest carry content chunks.
//! The receive loop feeds a bounded byte pipe; a spawned store task drains
//! the pipe into the blob backend, hashing as it writes. Once the blob is
//! durable the metadata row is committed; a failed commit is compensated by
//! deleting the blob again.

use crate::error::ApiError;
use crate::proto;
use crate::service::to_proto_artifact;
use crate::state::AppState;
use crate::validate;
use armory_storage::{ByteStream, StorageError, StorageResult};
use bytes::Bytes;
use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tonic::{Code, Status};

/// Depth of the in-process byte pipe between the receive loop and the store
/// task. Bounded so a fast client cannot buffer an entire artifact in memory.
const PIPE_DEPTH: usize = 16;

/// Run the upload pipeline over a stream of upload messages.
pub async fn handle_upload<S>(state: &AppState, mut stream: S) -> Result<proto::Artifact, ApiError>
where
    S: Stream<Item = Result<proto::UploadArtifactRequest, Status>> + Send + Unpin,
{
    let first = stream
        .next()
        .await
        .ok_or_else(|| ApiError::InvalidArgument("expected metadata message".to_string()))?
        .map_err(receive_error)?;

    let metadata = match first.payload {
        Some(proto::upload_artifact_request::Payload::Metadata(metadata)) => metadata,
        _ => {
            return Err(ApiError::InvalidArgument(
                "expected first message to be metadata".to_string(),
            ));
        }
    };

    let name = validate::parse_fqn(metadata.fqn.as_ref())?;
    let tags = metadata.tags;

    tracing::info!(name = %name, tags = ?tags, "artifact upload started");

    let storage = state.storage("artifact upload")?.clone();
    let store_storage = storage.clone();

    // One writer (the receive loop), one reader (the store task). The
    // cancellation token is armed by a drop guard: if this future is dropped
    // mid-upload the pipe is poisoned, so the store task fails instead of
    // committing a truncated blob as if the stream had ended cleanly.
    let (tx, rx) = mpsc::channel::<StorageResult<Bytes>>(PIPE_DEPTH);
    let cancel = CancellationToken::new();
    let guard = cancel.clone().drop_guard();

    let body = pipe_stream(rx, cancel);
    let store_task = tokio::spawn({
        let name = name.clone();
        async move { store_storage.store(&name, body).await }
    });

    let mut receive_failure: Option<ApiError> = None;
    loop {
        match stream.next().await {
            None => break,
            Some(Err(status)) => {
                let _ = tx
                    .send(Err(StorageError::Interrupted(status.to_string())))
                    .await;
                receive_failure = Some(receive_error(status));
                break;
            }
            Some(Ok(message)) => match message.payload {
                Some(proto::upload_artifact_request::Payload::Content(content)) => {
                    if tx.send(Ok(Bytes::from(content.data))).await.is_err() {
                        // Store task already finished; its error surfaces below.
                        break;
                    }
                }
                _ => {
                    let _ = tx
                        .send(Err(StorageError::Interrupted(
                            "missing content chunk".to_string(),
                        )))
                        .await;
                    receive_failure = Some(ApiError::InvalidArgument(
                        "expected content chunk in upload message".to_string(),
                    ));
                    break;
                }
            },
        }
    }
    drop(tx);

    let store_result = store_task
        .await
        .map_err(|e| ApiError::Internal(format!("store task failed: {e}")))?;
    guard.disarm();

    if let Some(err) = receive_failure {
        return Err(err);
    }
    let hash = store_result?;

    if let Err(err) = state.metadata.create_artifact(&name, &hash, &tags).await {
        // Saga compensation: the blob is already durable, so remove it before
        // surfacing the metadata failure. A failed compensation leaves an
        // orphan blob and needs operator attention.
        if let Err(delete_err) = storage.delete(&name, &hash).await {
            tracing::error!(
                name = %name,
                hash = %hash,
                error = %delete_err,
                "failed to delete blob after metadata commit failure"
            );
        }
        return Err(err.into());
    }

    let record = state.metadata.get_artifact_by_hash(&name, &hash).await?;

    tracing::info!(name = %name, hash = %hash, "artifact uploaded");

    Ok(to_proto_artifact(&record))
}

/// Adapt the pipe receiver into the backend's byte stream, merging in the
/// cancellation signal.
fn pipe_stream(mut rx: mpsc::Receiver<StorageResult<Bytes>>, cancel: CancellationToken) -> ByteStream {
    Box::pin(async_stream::stream! {
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    yield Err(StorageError::Interrupted("upload cancelled".to_string()));
                    break;
                }
                item = rx.recv() => match item {
                    Some(chunk) => yield chunk,
                    None => break,
                },
            }
        }
    })
}

/// Map a stream receive failure onto the facade error taxonomy.
fn receive_error(status: Status) -> ApiError {
    if status.code() == Code::Cancelled {
        ApiError::Canceled("artifact upload cancelled".to_string())
    } else {
        ApiError::Internal(format!("receiving upload message: {status}"))
    }
}
