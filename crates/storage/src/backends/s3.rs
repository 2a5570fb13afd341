//! S3-compatible storage backend using the AWS SDK.

use crate::error::{StorageError, StorageResult};
use crate::traits::{ArtifactStore, ByteStream};
use armory_core::config::S3Config;
use armory_core::{QualifiedName, VersionHash};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::Client;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use std::future::Future;
use std::time::Duration;
use tracing::instrument;

/// Minimum part size for S3 multipart uploads (5 MiB).
/// S3 requires all parts except the last to be at least 5 MB.
const MIN_PART_SIZE: usize = 5 * 1024 * 1024;

/// S3-compatible artifact store.
pub struct S3Store {
    client: Client,
    bucket: String,
    timeout: Duration,
}

impl std::fmt::Debug for S3Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Store")
            .field("bucket", &self.bucket)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl S3Store {
    /// Create a new S3 store from configuration.
    ///
    /// All connection fields are required; the per-operation timeout comes
    /// from the config's duration string.
    pub fn new(config: &S3Config) -> StorageResult<Self> {
        config
            .validate()
            .map_err(|e| StorageError::Config(e.to_string()))?;
        let timeout = config
            .timeout_duration()
            .map_err(|e| StorageError::Config(e.to_string()))?;

        let credentials = aws_sdk_s3::config::Credentials::new(
            config.key_id.clone(),
            config.access_key.clone(),
            None,
            None,
            "armory-config",
        );

        let s3_config = aws_sdk_s3::config::Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(aws_config::Region::new(config.region.clone()))
            .credentials_provider(credentials)
            .endpoint_url(&config.endpoint)
            .force_path_style(true)
            .build();

        Ok(Self {
            client: Client::from_conf(s3_config),
            bucket: config.bucket.clone(),
            timeout,
        })
    }

    /// Run an S3 call under the configured per-operation timeout.
    async fn with_timeout<T, F>(&self, fut: F) -> StorageResult<T>
    where
        F: Future<Output = StorageResult<T>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(StorageError::Timeout(self.timeout)),
        }
    }

    /// Convert an AWS SDK error to StorageError, mapping NotFound by HTTP status.
    fn map_sdk_error<E>(err: aws_sdk_s3::error::SdkError<E>, key: &str) -> StorageError
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        if let aws_sdk_s3::error::SdkError::ServiceError(ref service_err) = err {
            if service_err.raw().status().as_u16() == 404 {
                return StorageError::NotFound(key.to_string());
            }
        }
        StorageError::S3(Box::new(err))
    }

    /// Upload a fully buffered blob to `key` with a multipart upload,
    /// aborting the upload on any failure so no partial object stays behind.
    async fn upload_multipart(&self, key: &str, data: Bytes) -> StorageResult<()> {
        let create = self
            .with_timeout(async {
                self.client
                    .create_multipart_upload()
                    .bucket(&self.bucket)
                    .key(key)
                    .send()
                    .await
                    .map_err(|e| Self::map_sdk_error(e, key))
            })
            .await?;

        let upload_id = create.upload_id().unwrap_or_default().to_string();

        let result = self.upload_parts(key, &upload_id, data).await;
        if result.is_err() {
            // Best-effort abort; incomplete parts are invisible either way.
            let abort = self
                .client
                .abort_multipart_upload()
                .bucket(&self.bucket)
                .key(key)
                .upload_id(&upload_id)
                .send();
            if let Err(e) = self.with_timeout(async { abort.await.map_err(|e| Self::map_sdk_error(e, key)) }).await {
                tracing::warn!(key, error = %e, "failed to abort multipart upload");
            }
        }
        result
    }

    async fn upload_parts(&self, key: &str, upload_id: &str, data: Bytes) -> StorageResult<()> {
        let mut parts = Vec::new();

        for (index, part_data) in data.chunks(MIN_PART_SIZE).enumerate() {
            let part_number = (index + 1) as i32;
            let body = aws_sdk_s3::primitives::ByteStream::from(Bytes::copy_from_slice(part_data));

            let uploaded = self
                .with_timeout(async {
                    self.client
                        .upload_part()
                        .bucket(&self.bucket)
                        .key(key)
                        .upload_id(upload_id)
                        .part_number(part_number)
                        .body(body)
                        .send()
                        .await
                        .map_err(|e| Self::map_sdk_error(e, key))
                })
                .await?;

            parts.push(
                CompletedPart::builder()
                    .set_e_tag(uploaded.e_tag().map(str::to_string))
                    .part_number(part_number)
                    .build(),
            );
        }

        let completed = CompletedMultipartUpload::builder()
            .set_parts(Some(parts))
            .build();

        self.with_timeout(async {
            self.client
                .complete_multipart_upload()
                .bucket(&self.bucket)
                .key(key)
                .upload_id(upload_id)
                .multipart_upload(completed)
                .send()
                .await
                .map_err(|e| Self::map_sdk_error(e, key))
        })
        .await?;

        Ok(())
    }
}

#[async_trait]
impl ArtifactStore for S3Store {
    #[instrument(skip(self, content), fields(backend = "s3", name = %name))]
    async fn store(
        &self,
        name: &QualifiedName,
        mut content: ByteStream,
    ) -> StorageResult<VersionHash> {
        // The object key contains the content hash, so the stream is drained
        // and hashed before any bytes reach the bucket. Incomplete multipart
        // uploads are never visible under the final key.
        let mut buffer = BytesMut::new();
        let mut hasher = VersionHash::hasher();

        while let Some(chunk) = content.next().await {
            let chunk = chunk?;
            hasher.update(&chunk);
            buffer.extend_from_slice(&chunk);
        }

        let hash = hasher.finalize();
        let key = name.blob_key(&hash);
        let data = buffer.freeze();

        if data.len() < MIN_PART_SIZE {
            // Multipart requires non-empty parts; small objects go up in one
            // atomic PutObject instead.
            self.with_timeout(async {
                self.client
                    .put_object()
                    .bucket(&self.bucket)
                    .key(&key)
                    .body(aws_sdk_s3::primitives::ByteStream::from(data.clone()))
                    .send()
                    .await
                    .map_err(|e| Self::map_sdk_error(e, &key))
            })
            .await?;
        } else {
            self.upload_multipart(&key, data).await?;
        }

        Ok(hash)
    }

    #[instrument(skip(self), fields(backend = "s3", name = %name, hash = %hash))]
    async fn get(&self, name: &QualifiedName, hash: &VersionHash) -> StorageResult<Bytes> {
        let key = name.blob_key(hash);

        let object = self
            .with_timeout(async {
                self.client
                    .get_object()
                    .bucket(&self.bucket)
                    .key(&key)
                    .send()
                    .await
                    .map_err(|e| Self::map_sdk_error(e, &key))
            })
            .await?;

        let data = self
            .with_timeout(async {
                object
                    .body
                    .collect()
                    .await
                    .map_err(|e| StorageError::S3(Box::new(e)))
            })
            .await?;

        Ok(data.into_bytes())
    }

    #[instrument(skip(self), fields(backend = "s3", name = %name, hash = %hash))]
    async fn delete(&self, name: &QualifiedName, hash: &VersionHash) -> StorageResult<()> {
        let key = name.blob_key(hash);

        // DeleteObject succeeds for absent keys, so existence is checked with
        // a HEAD request to surface a typed NotFound.
        self.with_timeout(async {
            self.client
                .head_object()
                .bucket(&self.bucket)
                .key(&key)
                .send()
                .await
                .map_err(|e| Self::map_sdk_error(e, &key))
        })
        .await?;

        self.with_timeout(async {
            self.client
                .delete_object()
                .bucket(&self.bucket)
                .key(&key)
                .send()
                .await
                .map_err(|e| Self::map_sdk_error(e, &key))
        })
        .await?;

        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "s3"
    }

    #[instrument(skip(self), fields(backend = "s3"))]
    async fn health_check(&self) -> StorageResult<()> {
        self.with_timeout(async {
            self.client
                .head_bucket()
                .bucket(&self.bucket)
                .send()
                .await
                .map_err(|e| Self::map_sdk_error(e, &self.bucket))
        })
        .await?;
        Ok(())
    }
}
