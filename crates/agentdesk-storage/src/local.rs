use crate::keys::validate_path;
use crate::traits::{BlobStore, StorageError, StorageResult, StoredObject};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Local filesystem blob store. Buckets are directories under `base_path`.
#[derive(Clone)]
pub struct LocalBlobStore {
    base_path: PathBuf,
    base_url: String,
}

impl LocalBlobStore {
    /// Create a new LocalBlobStore instance
    ///
    /// # Arguments
    /// * `base_path` - Root directory for stored images (e.g., "/var/lib/agentdesk/media")
    /// * `base_url` - Base URL the directory is served from (e.g., "http://localhost:4000/media")
    pub async fn new(base_path: impl Into<PathBuf>, base_url: String) -> StorageResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(&base_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        Ok(LocalBlobStore {
            base_path,
            base_url,
        })
    }

    /// Resolve `bucket/path` to a filesystem path that cannot escape `base_path`.
    fn object_path(&self, bucket: &str, path: &str) -> StorageResult<PathBuf> {
        validate_path(bucket)?;
        validate_path(path)?;
        if bucket.contains('/') {
            return Err(StorageError::InvalidKey(format!(
                "Bucket must be a single path segment: {}",
                bucket
            )));
        }

        let full = self.base_path.join(bucket).join(path);

        let base_canonical = self.base_path.canonicalize().map_err(|e| {
            StorageError::ConfigError(format!("Failed to canonicalize base path: {}", e))
        })?;

        if let Ok(canonical) = full.canonicalize() {
            if canonical.strip_prefix(&base_canonical).is_err() {
                return Err(StorageError::InvalidKey(
                    "Storage path resolves outside storage directory".to_string(),
                ));
            }
        }

        Ok(full)
    }

    /// Ensure parent directory exists
    async fn ensure_parent_dir(&self, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(
        &self,
        bucket: &str,
        path: &str,
        _content_type: &str,
        data: Bytes,
    ) -> StorageResult<StoredObject> {
        let file_path = self.object_path(bucket, path)?;
        let size = data.len();

        self.ensure_parent_dir(&file_path).await?;

        let start = std::time::Instant::now();

        let mut file = fs::File::create(&file_path).await.map_err(|e| {
            StorageError::UploadFailed(format!(
                "Failed to create file {}: {}",
                file_path.display(),
                e
            ))
        })?;

        file.write_all(&data).await.map_err(|e| {
            StorageError::UploadFailed(format!(
                "Failed to write file {}: {}",
                file_path.display(),
                e
            ))
        })?;

        file.sync_all().await.map_err(|e| {
            StorageError::UploadFailed(format!(
                "Failed to sync file {}: {}",
                file_path.display(),
                e
            ))
        })?;

        tracing::info!(
            path = %file_path.display(),
            bucket = %bucket,
            key = %path,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage write successful"
        );

        Ok(StoredObject {
            path: path.to_string(),
            public_url: self.public_url(bucket, path),
            size_bytes: size as u64,
        })
    }

    async fn remove(&self, bucket: &str, paths: &[String]) -> StorageResult<()> {
        for path in paths {
            let file_path = self.object_path(bucket, path)?;

            match fs::remove_file(&file_path).await {
                Ok(()) => {
                    tracing::info!(
                        path = %file_path.display(),
                        bucket = %bucket,
                        key = %path,
                        "Local storage delete successful"
                    );
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    tracing::debug!(bucket = %bucket, key = %path, "Object already absent");
                }
                Err(e) => {
                    return Err(StorageError::DeleteFailed(format!(
                        "Failed to delete file {}: {}",
                        file_path.display(),
                        e
                    )));
                }
            }
        }

        Ok(())
    }

    async fn exists(&self, bucket: &str, path: &str) -> StorageResult<bool> {
        let file_path = self.object_path(bucket, path)?;
        Ok(fs::try_exists(&file_path).await.unwrap_or(false))
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("{}/{}/{}", self.base_url.trim_end_matches('/'), bucket, path)
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}
