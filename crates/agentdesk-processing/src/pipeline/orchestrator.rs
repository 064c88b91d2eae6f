use super::cache::{CacheStats, ProcessingCache};
use super::progress::{ProgressListener, ProgressTracker};
use super::result::{ProcessingResult, ProcessingStage};
use crate::codec::ImageCodec;
use crate::metadata::ImageMetadata;
use crate::optimizer::{ImageOptimizer, OptimizationError, OptimizationResult};
use crate::upload::{RetryPolicy, Uploader};
use crate::validator::{ImageValidator, ValidationResult};
use agentdesk_core::constants::OPTIMIZE_SIZE_THRESHOLD_BYTES;
use agentdesk_core::{
    ErrorMetadata, LogLevel, OptimizationOptions, OutputFormat, PipelineError, PipelineOptions,
    SourceFile, UploadDestination, UploadRecord, ValidationOptions,
};
use agentdesk_storage::{BlobStore, RecordStore};
use futures::future::join_all;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

/// Per-call upload context
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessingContext {
    pub destination: UploadDestination,
}

impl ProcessingContext {
    pub fn new(destination: UploadDestination) -> Self {
        Self { destination }
    }
}

/// Drives files through validate, optimize and upload.
///
/// A pipeline instance owns its cache; results are memoized for the lifetime
/// of the instance or until [`ImagePipeline::clear_cache`].
pub struct ImagePipeline {
    validator: ImageValidator,
    optimizer: ImageOptimizer,
    uploader: Uploader,
    cache: ProcessingCache,
    abort: Mutex<CancellationToken>,
}

impl ImagePipeline {
    pub fn new(
        codec: Arc<dyn ImageCodec>,
        blobs: Arc<dyn BlobStore>,
        records: Arc<dyn RecordStore>,
    ) -> Self {
        let optimizer = ImageOptimizer::new(codec.clone());
        Self {
            validator: ImageValidator::new(codec),
            uploader: Uploader::new(blobs, records, optimizer.clone()),
            optimizer,
            cache: ProcessingCache::new(),
            abort: Mutex::new(CancellationToken::new()),
        }
    }

    pub fn uploader(&self) -> &Uploader {
        &self.uploader
    }

    /// Key under which the upload of a submitted file is registered for
    /// cancellation. Derived from the file as submitted, before optimization.
    pub fn upload_key(file: &SourceFile) -> String {
        file.fingerprint()
    }

    pub fn validate(&self, file: &SourceFile, options: &ValidationOptions) -> ValidationResult {
        let key = ProcessingCache::key("validate", file, options);
        if let Some(hit) = self.cache.validation(&key) {
            return hit;
        }
        let result = self.validator.validate(file, options);
        self.cache.store_validation(key, result)
    }

    pub async fn optimize(
        &self,
        file: &SourceFile,
        options: &OptimizationOptions,
    ) -> Result<OptimizationResult, OptimizationError> {
        let key = ProcessingCache::key("optimize", file, options);
        if let Some(hit) = self.cache.optimization(&key) {
            return Ok(hit);
        }

        let optimizer = self.optimizer.clone();
        let source = file.clone();
        let opts = options.clone();
        let result = tokio::task::spawn_blocking(move || optimizer.optimize(&source, &opts))
            .await
            .map_err(|e| OptimizationError::Task(e.to_string()))??;

        Ok(self.cache.store_optimization(key, result))
    }

    async fn upload(
        &self,
        key: &str,
        file: &SourceFile,
        context: &ProcessingContext,
        options: &PipelineOptions,
    ) -> Result<UploadRecord, PipelineError> {
        let key = ProcessingCache::key("upload", file, &(&context.destination, &options.upload));
        if let Some(hit) = self.cache.upload(&key) {
            return Ok(hit);
        }

        let policy = RetryPolicy::from_options(&options.batch, &options.upload);
        let record = self
            .uploader
            .upload_with_retry(
                key,
                file,
                &context.destination,
                &options.upload,
                &policy,
            )
            .await?;

        Ok(self.cache.store_upload(key, record))
    }

    /// Whether a file is worth re-encoding before upload.
    pub fn should_optimize(
        file: &SourceFile,
        metadata: &ImageMetadata,
        options: &OptimizationOptions,
    ) -> bool {
        if file.size() > OPTIMIZE_SIZE_THRESHOLD_BYTES {
            return true;
        }
        if metadata.width > options.max_width || metadata.height > options.max_height {
            return true;
        }
        if options.format != OutputFormat::Auto
            && options.format.image_type() != file.declared_type()
        {
            return true;
        }
        options.strip_exif && metadata.has_exif
    }

    pub async fn process_image(
        &self,
        file: SourceFile,
        options: &PipelineOptions,
        context: &ProcessingContext,
    ) -> ProcessingResult {
        let tracker = ProgressTracker::new(1, Vec::new());
        self.run_file(file, options, context, &tracker).await
    }

    async fn run_file(
        &self,
        file: SourceFile,
        options: &PipelineOptions,
        context: &ProcessingContext,
        tracker: &ProgressTracker,
    ) -> ProcessingResult {
        let started = Instant::now();
        let name = file.name.clone();
        tracker.file_started(&name);

        let result = self
            .run_stages(file, options, context, tracker)
            .await
            .finish(started.elapsed());

        match &result.error {
            Some(error) => log_failure(&name, error),
            None => tracing::info!(
                file = %name,
                status = ?result.status,
                elapsed_ms = result.elapsed.as_millis() as u64,
                "Image processed"
            ),
        }

        tracker.file_finished(&name, result.is_success());
        result
    }

    async fn run_stages(
        &self,
        file: SourceFile,
        options: &PipelineOptions,
        context: &ProcessingContext,
        tracker: &ProgressTracker,
    ) -> ProcessingResult {
        let validation = self.validate(&file, &options.validation);
        let metadata = validation.metadata.clone();
        let mut result = ProcessingResult::new(file, validation);

        let metadata = match metadata {
            Some(metadata) if result.validation.admitted => metadata,
            _ => {
                let errors = result.validation.errors.clone();
                return result.fail(PipelineError::Validation(errors));
            }
        };

        let upload_file = if Self::should_optimize(&result.file, &metadata, &options.optimization) {
            tracker.stage_changed(&result.file.name, ProcessingStage::Optimizing);
            match self.optimize(&result.file, &options.optimization).await {
                Ok(optimized) => {
                    let output = optimized.output_file.clone();
                    result.optimization = Some(optimized);
                    output
                }
                Err(e) => return result.fail(PipelineError::Optimization(e.to_string())),
            }
        } else {
            tracing::debug!(file = %result.file.name, "Optimization skipped");
            result.file.clone()
        };

        tracker.stage_changed(&result.file.name, ProcessingStage::Uploading);
        let key = Self::upload_key(&result.file);
        match self.upload(&key, &upload_file, context, options).await {
            Ok(record) => {
                result.upload = Some(record);
                result
            }
            Err(e) => result.fail(e),
        }
    }

    /// Process a batch. Results follow submission order; files not dispatched
    /// before [`ImagePipeline::abort`] are omitted. An abort requested before
    /// the call skips the whole batch.
    pub async fn process_images(
        &self,
        files: Vec<SourceFile>,
        options: &PipelineOptions,
        context: &ProcessingContext,
        listeners: Vec<ProgressListener>,
    ) -> Vec<ProcessingResult> {
        let abort = self.abort_token();
        let total = files.len();
        let tracker = ProgressTracker::new(total, listeners);
        let started = Instant::now();

        tracing::info!(
            files = total,
            parallel = options.batch.enable_parallel_processing,
            max_concurrent = options.batch.max_concurrent_uploads,
            "Processing batch"
        );

        let dispatched: Vec<Option<ProcessingResult>> = if options.batch.enable_parallel_processing {
            let semaphore = Arc::new(Semaphore::new(options.batch.max_concurrent_uploads.max(1)));
            let tracker = &tracker;
            let abort = &abort;
            join_all(files.into_iter().map(|file| {
                let semaphore = semaphore.clone();
                async move {
                    let _permit = tokio::select! {
                        biased;
                        _ = abort.cancelled() => return None,
                        permit = semaphore.acquire_owned() => permit.ok()?,
                    };
                    if abort.is_cancelled() {
                        return None;
                    }
                    Some(self.run_file(file, options, context, tracker).await)
                }
            }))
            .await
        } else {
            let mut out = Vec::with_capacity(total);
            for file in files {
                if abort.is_cancelled() {
                    break;
                }
                out.push(Some(self.run_file(file, options, context, &tracker).await));
            }
            out
        };

        let results: Vec<ProcessingResult> = dispatched.into_iter().flatten().collect();
        tracker.emit(None, ProcessingStage::Completed);
        if abort.is_cancelled() {
            self.reset_abort();
        }

        let succeeded = results.iter().filter(|r| r.is_success()).count();
        let warned = results.iter().filter(|r| r.has_warnings()).count();
        tracing::info!(
            files = total,
            processed = results.len(),
            succeeded = succeeded - warned,
            warned = warned,
            failed = results.len() - succeeded,
            skipped = total - results.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Batch finished"
        );

        results
    }

    fn abort_token(&self) -> CancellationToken {
        self.abort.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Drop a pending abort so the next batch runs. Called at the end of
    /// every batch.
    pub fn reset_abort(&self) {
        *self.abort.lock().unwrap_or_else(|e| e.into_inner()) = CancellationToken::new();
    }

    /// Stop dispatching files of the running batch. In-flight files finish.
    /// Requested while no batch runs, it applies to the next batch.
    pub fn abort(&self) {
        self.abort.lock().unwrap_or_else(|e| e.into_inner()).cancel();
        tracing::info!("Batch abort requested");
    }

    pub fn cancel_upload(&self, key: &str) -> bool {
        self.uploader.cancel(key)
    }

    pub fn cancel_all_uploads(&self) -> usize {
        self.uploader.cancel_all()
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

fn log_failure(file: &str, error: &PipelineError) {
    let code = error.error_code();
    match error.log_level() {
        LogLevel::Debug => {
            tracing::debug!(file = %file, error_code = code, error = %error, "Image processing failed")
        }
        LogLevel::Warn => {
            tracing::warn!(file = %file, error_code = code, error = %error, "Image processing failed")
        }
        LogLevel::Error => {
            tracing::error!(file = %file, error_code = code, error = %error, "Image processing failed")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::StandardCodec;
    use agentdesk_core::ImageType;
    use chrono::Utc;

    fn metadata(width: u32, height: u32, has_exif: bool) -> ImageMetadata {
        ImageMetadata::new(width, height, 1000, "image/jpeg", Some(ImageType::Jpeg), has_exif, 1)
    }

    fn file(size: usize) -> SourceFile {
        SourceFile::new("a.jpg", "image/jpeg", vec![0u8; size], Utc::now())
    }

    #[test]
    fn test_should_optimize_rules() {
        let defaults = OptimizationOptions::default();
        assert!(!ImagePipeline::should_optimize(&file(1000), &metadata(800, 600, false), &defaults));
        assert!(ImagePipeline::should_optimize(
            &file(2 * 1024 * 1024 + 1),
            &metadata(800, 600, false),
            &defaults
        ));
        assert!(ImagePipeline::should_optimize(&file(1000), &metadata(2000, 600, false), &defaults));
        assert!(ImagePipeline::should_optimize(&file(1000), &metadata(800, 600, true), &defaults));

        let keep_exif = OptimizationOptions {
            strip_exif: false,
            ..Default::default()
        };
        assert!(!ImagePipeline::should_optimize(&file(1000), &metadata(800, 600, true), &keep_exif));

        let pinned_same = OptimizationOptions {
            format: OutputFormat::Jpeg,
            ..Default::default()
        };
        assert!(!ImagePipeline::should_optimize(&file(1000), &metadata(800, 600, false), &pinned_same));
        let pinned_other = OptimizationOptions {
            format: OutputFormat::WebP,
            ..Default::default()
        };
        assert!(ImagePipeline::should_optimize(&file(1000), &metadata(800, 600, false), &pinned_other));
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let pipeline = ImagePipeline::new(
            Arc::new(StandardCodec::new()),
            Arc::new(agentdesk_storage::InMemoryBlobStore::new()),
            Arc::new(agentdesk_storage::InMemoryRecordStore::new()),
        );
        let results = pipeline
            .process_images(Vec::new(), &PipelineOptions::default(), &ProcessingContext::default(), Vec::new())
            .await;
        assert!(results.is_empty());
        assert_eq!(pipeline.cache_stats(), CacheStats::default());
    }
}
