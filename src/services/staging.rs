use crate::api::error::AppError;
use crate::utils::validation::is_body_limit_error;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use uuid::Uuid;

const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// A temporary file owned by one request.
///
/// The backing file is removed by [`StagingManager::release`] or, failing
/// that, when the artifact is dropped. No file handle is kept open.
#[derive(Debug)]
pub struct StagedArtifact {
    path: PathBuf,
    released: AtomicBool,
}

impl StagedArtifact {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            released: AtomicBool::new(false),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StagedArtifact {
    fn drop(&mut self) {
        if self.released.swap(true, Ordering::SeqCst) {
            return;
        }
        // Blocking removal so the file is gone once the guard is; only reached
        // when a request is dropped before `release` runs.
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(
                    "Failed to remove staged artifact {}: {}",
                    self.path.display(),
                    e
                );
            }
        }
    }
}

/// Owns the on-disk lifecycle of upload artifacts inside `dir`
pub struct StagingManager {
    dir: PathBuf,
    max_size: u64,
}

impl StagingManager {
    pub fn new(dir: PathBuf, max_size: u64) -> Self {
        Self { dir, max_size }
    }

    /// Copy `reader` into a fresh, uniquely named file.
    ///
    /// Fails with `PayloadTooLarge` once more than `max_size` bytes arrive;
    /// the partial file is removed before returning.
    pub async fn stage<R>(&self, mut reader: R) -> Result<StagedArtifact, AppError>
    where
        R: AsyncRead + Unpin + Send,
    {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to create staging dir: {}", e)))?;

        let temp_file = tempfile::Builder::new()
            .prefix(&format!("upload-{}-", Uuid::new_v4()))
            .suffix(".mp4")
            .tempfile_in(&self.dir)
            .map_err(|e| AppError::Internal(format!("Failed to create temp file: {}", e)))?;
        let (std_file, temp_path) = temp_file.into_parts();
        let path = temp_path
            .keep()
            .map_err(|e| AppError::Internal(format!("Failed to keep temp file: {}", e)))?;

        // From here on the artifact guard owns removal
        let artifact = StagedArtifact::new(path);

        let total = {
            let mut file = tokio::fs::File::from_std(std_file);
            let total = self.copy_bounded(&mut reader, &mut file).await?;
            file.flush()
                .await
                .map_err(|e| AppError::Internal(format!("Failed to flush temp file: {}", e)))?;
            file.sync_all()
                .await
                .map_err(|e| AppError::Internal(format!("Failed to sync temp file: {}", e)))?;
            total
        };

        tracing::info!(
            "Staged {} bytes to {}",
            total,
            artifact.path().display()
        );
        Ok(artifact)
    }

    async fn copy_bounded<R>(
        &self,
        reader: &mut R,
        file: &mut tokio::fs::File,
    ) -> Result<u64, AppError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let mut buffer = vec![0u8; COPY_BUFFER_SIZE];
        let mut total: u64 = 0;

        loop {
            let n = reader.read(&mut buffer).await.map_err(|e| {
                if is_body_limit_error(&e) {
                    AppError::PayloadTooLarge(
                        "Request body exceeds the maximum allowed size".to_string(),
                    )
                } else {
                    tracing::warn!("Upload stream read failed: {}", e);
                    AppError::BadRequest("Couldn't read uploaded file".to_string())
                }
            })?;
            if n == 0 {
                break;
            }

            total += n as u64;
            if total > self.max_size {
                return Err(AppError::PayloadTooLarge(
                    "Request body exceeds the maximum allowed size".to_string(),
                ));
            }

            file.write_all(&buffer[..n])
                .await
                .map_err(|e| AppError::Internal(format!("Failed to write temp file: {}", e)))?;
        }

        Ok(total)
    }

    /// Take ownership of a derived file that may or may not exist yet, so it
    /// is cleaned up with the rest of the request's artifacts.
    pub fn track(&self, path: PathBuf) -> StagedArtifact {
        StagedArtifact::new(path)
    }

    /// Remove the artifact's backing file. Safe to call repeatedly.
    pub async fn release(&self, artifact: &StagedArtifact) {
        artifact.released.store(true, Ordering::SeqCst);
        match tokio::fs::remove_file(artifact.path()).await {
            Ok(()) => tracing::debug!("Released {}", artifact.path().display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                "Failed to release staged artifact {}: {}",
                artifact.path().display(),
                e
            ),
        }
    }
}
