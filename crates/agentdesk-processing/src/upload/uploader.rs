use super::retry::RetryPolicy;
use crate::optimizer::ImageOptimizer;
use agentdesk_core::{
    ImageType, OptimizationOptions, OutputFormat, PipelineError, RecordUpdate, SourceFile,
    ThumbnailRecord, ThumbnailSpec, UploadDestination, UploadOptions, UploadRecord,
};
use agentdesk_storage::keys::{generate_storage_path, thumbnail_path};
use agentdesk_storage::{BlobStore, RecordStore};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

type Registry = HashMap<String, (u64, CancellationToken)>;

/// Uploads optimized images and their thumbnails, then records them.
///
/// Every in-flight upload is registered under its key with a
/// [`CancellationToken`]; [`Uploader::cancel`] aborts the blob write and
/// removes anything already written.
pub struct Uploader {
    blobs: Arc<dyn BlobStore>,
    records: Arc<dyn RecordStore>,
    optimizer: ImageOptimizer,
    active: Mutex<Registry>,
    next_id: AtomicU64,
}

/// Removes a registry entry on drop, unless a newer upload took the key over.
struct Registration<'a> {
    active: &'a Mutex<Registry>,
    key: String,
    id: u64,
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        if active.get(&self.key).map(|(id, _)| *id) == Some(self.id) {
            active.remove(&self.key);
        }
    }
}

impl Uploader {
    pub fn new(
        blobs: Arc<dyn BlobStore>,
        records: Arc<dyn RecordStore>,
        optimizer: ImageOptimizer,
    ) -> Self {
        Self {
            blobs,
            records,
            optimizer,
            active: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.active.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn register(&self, key: &str) -> (Registration<'_>, CancellationToken) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();
        if self
            .registry()
            .insert(key.to_string(), (id, token.clone()))
            .is_some()
        {
            tracing::debug!(key = %key, "Upload key re-registered");
        }
        (
            Registration {
                active: &self.active,
                key: key.to_string(),
                id,
            },
            token,
        )
    }

    /// Single upload attempt: main blob, thumbnails, then the record.
    pub async fn upload(
        &self,
        key: &str,
        file: &SourceFile,
        destination: &UploadDestination,
        options: &UploadOptions,
    ) -> Result<UploadRecord, PipelineError> {
        let (_registration, token) = self.register(key);
        self.upload_once(&token, file, destination, options).await
    }

    /// Upload with exponential backoff. Cancellation is never retried and also
    /// interrupts a pending backoff.
    pub async fn upload_with_retry(
        &self,
        key: &str,
        file: &SourceFile,
        destination: &UploadDestination,
        options: &UploadOptions,
        policy: &RetryPolicy,
    ) -> Result<UploadRecord, PipelineError> {
        let (_registration, token) = self.register(key);
        let max_attempts = policy.max_attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            match self.upload_once(&token, file, destination, options).await {
                Ok(record) => {
                    if attempt > 1 {
                        tracing::info!(key = %key, attempt = attempt, "Upload succeeded after retry");
                    }
                    return Ok(record);
                }
                Err(e @ PipelineError::Cancelled(_)) => return Err(e),
                Err(e) => {
                    tracing::warn!(
                        key = %key,
                        attempt = attempt,
                        max_attempts = max_attempts,
                        error = %e,
                        "Upload attempt failed"
                    );
                    last_error = Some(e);

                    if attempt < max_attempts {
                        let delay = policy.delay_for(attempt);
                        tokio::select! {
                            _ = token.cancelled() => {
                                return Err(PipelineError::Cancelled(file.name.clone()));
                            }
                            _ = tokio::time::sleep(delay) => {}
                        }
                    }
                }
            }
        }

        let message = match last_error {
            Some(PipelineError::Upload(message)) => message,
            Some(other) => other.to_string(),
            None => "no attempt was made".to_string(),
        };
        Err(PipelineError::UploadExhausted {
            attempts: max_attempts,
            message,
        })
    }

    async fn upload_once(
        &self,
        token: &CancellationToken,
        file: &SourceFile,
        destination: &UploadDestination,
        options: &UploadOptions,
    ) -> Result<UploadRecord, PipelineError> {
        if token.is_cancelled() {
            return Err(PipelineError::Cancelled(file.name.clone()));
        }

        let bucket = destination.bucket.as_str();
        let file_type = ImageType::from_mime(&file.content_type);
        let extension = file_type
            .map(|t| t.default_extension().to_string())
            .or_else(|| file.extension())
            .unwrap_or_else(|| "bin".to_string());
        let file_id = Uuid::new_v4();
        let path = generate_storage_path(&destination.folder, file_id, &extension);

        let put = self
            .blobs
            .put(bucket, &path, &file.content_type, file.data.clone());
        let stored = tokio::select! {
            biased;
            _ = token.cancelled() => {
                self.discard(bucket, std::slice::from_ref(&path)).await;
                tracing::info!(file = %file.name, path = %path, "Upload cancelled");
                return Err(PipelineError::Cancelled(file.name.clone()));
            }
            result = put => result.map_err(|e| PipelineError::Upload(e.to_string()))?,
        };

        let mut written = vec![stored.path.clone()];
        let mut thumbnails = Vec::with_capacity(options.thumbnails.len());

        for spec in &options.thumbnails {
            if token.is_cancelled() {
                break;
            }
            if let Some(thumbnail) = self
                .store_thumbnail(file, file_type, spec, destination, file_id)
                .await
            {
                written.push(thumbnail.path.clone());
                thumbnails.push(thumbnail);
            }
        }

        if token.is_cancelled() {
            self.discard(bucket, &written).await;
            tracing::info!(file = %file.name, path = %path, "Upload cancelled");
            return Err(PipelineError::Cancelled(file.name.clone()));
        }

        let (width, height) = match self.optimizer.codec().probe(&file.data) {
            Ok(info) => (Some(info.width), Some(info.height)),
            Err(_) => (None, None),
        };

        let record = UploadRecord {
            id: file_id,
            remote_url: stored.public_url,
            storage_path: stored.path,
            bucket: bucket.to_string(),
            content_type: file.content_type.clone(),
            size_bytes: file.size(),
            width,
            height,
            thumbnails,
            listing_id: destination.listing_id.clone(),
            original_name: file.name.clone(),
            is_primary: false,
            sort_order: 0,
            alt_text: None,
            created_at: Utc::now(),
        };

        match self.records.insert(record).await {
            Ok(record) => {
                tracing::info!(
                    file = %file.name,
                    record_id = %record.id,
                    path = %record.storage_path,
                    size_bytes = record.size_bytes,
                    thumbnails = record.thumbnails.len(),
                    "Image uploaded"
                );
                Ok(record)
            }
            Err(e) => {
                let rolled_back = match self.blobs.remove(bucket, &written).await {
                    Ok(()) => true,
                    Err(remove_err) => {
                        tracing::error!(
                            path = %path,
                            error = %remove_err,
                            "Failed to roll back blobs after record write failure"
                        );
                        false
                    }
                };
                tracing::error!(
                    file = %file.name,
                    path = %path,
                    rolled_back = rolled_back,
                    error = %e,
                    "Record write failed"
                );
                Err(PipelineError::Consistency {
                    path,
                    message: e.to_string(),
                    rolled_back,
                })
            }
        }
    }

    /// Render and store one thumbnail. Failures are logged and yield `None`.
    async fn store_thumbnail(
        &self,
        file: &SourceFile,
        file_type: Option<ImageType>,
        spec: &ThumbnailSpec,
        destination: &UploadDestination,
        file_id: Uuid,
    ) -> Option<ThumbnailRecord> {
        let format = match file_type {
            Some(ImageType::Png) => OutputFormat::Png,
            Some(ImageType::WebP) if self.optimizer.codec().can_encode(OutputFormat::WebP) => {
                OutputFormat::WebP
            }
            _ => OutputFormat::Jpeg,
        };
        let options = OptimizationOptions::for_thumbnail(spec, format);
        let optimizer = self.optimizer.clone();
        let source = file.clone();

        let rendered =
            match tokio::task::spawn_blocking(move || optimizer.optimize(&source, &options)).await {
                Ok(Ok(result)) => result.output_file,
                Ok(Err(e)) => {
                    tracing::warn!(file = %file.name, size = %spec.label, error = %e, "Thumbnail generation failed");
                    return None;
                }
                Err(e) => {
                    tracing::warn!(file = %file.name, size = %spec.label, error = %e, "Thumbnail task failed");
                    return None;
                }
            };

        let path = thumbnail_path(&destination.folder, &spec.label, file_id, format.extension());
        match self
            .blobs
            .put(&destination.bucket, &path, &rendered.content_type, rendered.data)
            .await
        {
            Ok(stored) => Some(ThumbnailRecord {
                size_label: spec.label.clone(),
                url: stored.public_url,
                path: stored.path,
            }),
            Err(e) => {
                tracing::warn!(file = %file.name, size = %spec.label, error = %e, "Thumbnail upload failed");
                None
            }
        }
    }

    async fn discard(&self, bucket: &str, paths: &[String]) {
        if let Err(e) = self.blobs.remove(bucket, paths).await {
            tracing::warn!(error = %e, "Failed to remove blobs of cancelled upload");
        }
    }

    /// Cancel the upload registered under `key`. Returns whether one was found.
    pub fn cancel(&self, key: &str) -> bool {
        match self.registry().remove(key) {
            Some((_, token)) => {
                token.cancel();
                tracing::info!(key = %key, "Upload cancellation requested");
                true
            }
            None => false,
        }
    }

    /// Cancel every registered upload. Returns how many were cancelled.
    pub fn cancel_all(&self) -> usize {
        let drained: Vec<_> = self.registry().drain().collect();
        for (_, (_, token)) in &drained {
            token.cancel();
        }
        if !drained.is_empty() {
            tracing::info!(count = drained.len(), "All uploads cancelled");
        }
        drained.len()
    }

    pub fn active_uploads(&self) -> Vec<String> {
        self.registry().keys().cloned().collect()
    }

    pub async fn update_metadata(
        &self,
        id: Uuid,
        update: RecordUpdate,
    ) -> Result<UploadRecord, PipelineError> {
        self.records
            .update(id, &update)
            .await
            .map_err(|e| PipelineError::Upload(e.to_string()))
    }

    /// Remove an uploaded image: blobs first, then its record.
    pub async fn delete(&self, record: &UploadRecord) -> Result<(), PipelineError> {
        self.blobs
            .remove(&record.bucket, &record.all_paths())
            .await
            .map_err(|e| PipelineError::Upload(e.to_string()))?;
        self.records
            .delete(record.id)
            .await
            .map_err(|e| PipelineError::Upload(e.to_string()))?;
        tracing::info!(record_id = %record.id, "Upload deleted");
        Ok(())
    }
}
