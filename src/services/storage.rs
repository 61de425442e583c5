use anyhow::{Result, anyhow};
use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;
use std::path::Path;
use tokio_util::sync::CancellationToken;

#[async_trait]
pub trait StorageService: Send + Sync {
    /// Stream the file at `path` to `key`. The object is durable only once
    /// this returns `Ok`. No retries are attempted.
    async fn upload_file(
        &self,
        key: &str,
        content_type: &str,
        path: &Path,
        cancel: &CancellationToken,
    ) -> Result<()>;

    async fn health_check(&self) -> bool;
}

pub struct S3StorageService {
    client: Client,
    bucket: String,
}

impl S3StorageService {
    pub fn new(client: Client, bucket: String) -> Self {
        Self { client, bucket }
    }
}

#[async_trait]
impl StorageService for S3StorageService {
    async fn upload_file(
        &self,
        key: &str,
        content_type: &str,
        path: &Path,
        cancel: &CancellationToken,
    ) -> Result<()> {
        // Body is read from disk as it is sent, never buffered whole
        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| anyhow!("Failed to open {} for upload: {}", path.display(), e))?;

        let request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(body)
            .send();

        tokio::select! {
            res = request => {
                if let Err(e) = res {
                    tracing::error!(
                        "S3 put_object failed: bucket={}, key={}, error={:?}",
                        self.bucket,
                        key,
                        e
                    );
                    return Err(e.into());
                }
            }
            _ = cancel.cancelled() => {
                return Err(anyhow!("Upload of {} cancelled", key));
            }
        }

        Ok(())
    }

    async fn health_check(&self) -> bool {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .is_ok()
    }
}
