//! Support code for the `agentdesk-ingest` binary: tracing setup, loading
//! files from disk and the JSON batch summary.

use agentdesk_core::{ImageType, SourceFile};
use agentdesk_processing::{
    BatchProgress, CacheStats, ProcessingResult, ProcessingStage, ProcessingStatus,
    ProgressListener,
};
use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{fmt::format::Format, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize tracing for the CLI. `LOG_FORMAT=json` switches to JSON lines.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "agentdesk=info".into());
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        let console_fmt = tracing_subscriber::fmt::layer()
            .event_format(Format::default().compact().with_target(false))
            .with_writer(std::io::stderr);
        tracing_subscriber::registry().with(filter).with(console_fmt).init();
    }
}

/// Media type inferred from a file extension.
pub fn content_type_for(path: &Path) -> &'static str {
    path.extension()
        .and_then(|e| e.to_str())
        .and_then(ImageType::from_extension)
        .map(ImageType::mime_type)
        .unwrap_or("application/octet-stream")
}

async fn load_file(path: &Path) -> anyhow::Result<SourceFile> {
    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let modified_at = tokio::fs::metadata(path)
        .await
        .and_then(|m| m.modified())
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| Utc::now());
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    Ok(SourceFile::new(name, content_type_for(path), data, modified_at))
}

/// Read files, expanding directories one level deep (sorted by name).
pub async fn load_source_files(paths: &[PathBuf]) -> anyhow::Result<Vec<SourceFile>> {
    let mut files = Vec::new();

    for path in paths {
        let metadata = tokio::fs::metadata(path)
            .await
            .with_context(|| format!("Failed to stat {}", path.display()))?;

        if metadata.is_dir() {
            let mut entries = tokio::fs::read_dir(path)
                .await
                .with_context(|| format!("Failed to list {}", path.display()))?;
            let mut children = Vec::new();
            while let Some(entry) = entries.next_entry().await? {
                if entry.file_type().await?.is_file() {
                    children.push(entry.path());
                }
            }
            children.sort();
            for child in children {
                files.push(load_file(&child).await?);
            }
        } else {
            files.push(load_file(path).await?);
        }
    }

    Ok(files)
}

/// Listener that logs each finished file.
pub fn progress_logger() -> ProgressListener {
    Arc::new(|progress: &BatchProgress| {
        if !matches!(
            progress.current_stage,
            ProcessingStage::Completed | ProcessingStage::Failed
        ) {
            return;
        }
        if let Some(file) = &progress.current_file {
            tracing::info!(
                file = %file,
                stage = %progress.current_stage,
                done = progress.completed + progress.failed,
                total = progress.total,
                eta_secs = progress.eta.as_secs(),
                "Progress {:.0}%",
                progress.fraction * 100.0
            );
        }
    })
}

#[derive(Debug, Serialize)]
pub struct FileSummary {
    pub name: String,
    pub status: ProcessingStatus,
    pub remote_url: Option<String>,
    pub storage_path: Option<String>,
    pub original_bytes: u64,
    pub uploaded_bytes: Option<u64>,
    pub applied_optimizations: Vec<String>,
    pub suggestions: Vec<String>,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
    pub elapsed_ms: u64,
}

impl From<&ProcessingResult> for FileSummary {
    fn from(result: &ProcessingResult) -> Self {
        Self {
            name: result.file.name.clone(),
            status: result.status,
            remote_url: result.upload.as_ref().map(|r| r.remote_url.clone()),
            storage_path: result.upload.as_ref().map(|r| r.storage_path.clone()),
            original_bytes: result.file.size(),
            uploaded_bytes: result.upload.as_ref().map(|r| r.size_bytes),
            applied_optimizations: result
                .optimization
                .as_ref()
                .map(|o| o.applied_optimizations.clone())
                .unwrap_or_default(),
            suggestions: result.validation.suggestions.clone(),
            warnings: result.warnings.clone(),
            errors: result.errors.clone(),
            elapsed_ms: result.elapsed.as_millis() as u64,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    /// Uploaded without warnings.
    pub succeeded: usize,
    /// Uploaded, with validation warnings.
    pub warned: usize,
    pub failed: usize,
    /// Files never dispatched because the batch was aborted.
    pub skipped: usize,
    pub cache: CacheStats,
    pub files: Vec<FileSummary>,
}

impl BatchSummary {
    pub fn new(total: usize, results: &[ProcessingResult], cache: CacheStats) -> Self {
        let uploaded = results.iter().filter(|r| r.is_success()).count();
        let warned = results.iter().filter(|r| r.has_warnings()).count();
        Self {
            total,
            succeeded: uploaded - warned,
            warned,
            failed: results.len() - uploaded,
            skipped: total.saturating_sub(results.len()),
            cache,
            files: results.iter().map(FileSummary::from).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentdesk_core::{OutputFormat, PipelineOptions, UploadDestination};
    use agentdesk_processing::{
        ImageCodec, ImagePipeline, ProcessingContext, RasterBuffer, StandardCodec,
    };
    use agentdesk_storage::{InMemoryBlobStore, InMemoryRecordStore};

    #[test]
    fn test_content_type_for() {
        assert_eq!(content_type_for(Path::new("a/b/photo.JPG")), "image/jpeg");
        assert_eq!(content_type_for(Path::new("plan.png")), "image/png");
        assert_eq!(content_type_for(Path::new("x.webp")), "image/webp");
        assert_eq!(content_type_for(Path::new("IMG.heic")), "image/heic");
        assert_eq!(content_type_for(Path::new("notes.txt")), "application/octet-stream");
        assert_eq!(content_type_for(Path::new("README")), "application/octet-stream");
    }

    #[tokio::test]
    async fn test_load_source_files_expands_directories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.png"), b"bbb").unwrap();
        std::fs::write(dir.path().join("a.jpg"), b"aa").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        let single = dir.path().join("nested").join("c.webp");
        std::fs::write(&single, b"c").unwrap();

        let files = load_source_files(&[dir.path().to_path_buf(), single])
            .await
            .unwrap();

        let names: Vec<_> = files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["a.jpg", "b.png", "c.webp"]);
        assert_eq!(files[0].content_type, "image/jpeg");
        assert_eq!(files[1].size(), 3);
    }

    #[tokio::test]
    async fn test_load_missing_path_fails() {
        let err = load_source_files(&[PathBuf::from("/definitely/not/here.jpg")])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Failed to stat"));
    }

    #[tokio::test]
    async fn test_summary_counts() {
        let pipeline = ImagePipeline::new(
            Arc::new(StandardCodec::new()),
            Arc::new(InMemoryBlobStore::new()),
            Arc::new(InMemoryRecordStore::new()),
        );
        let junk = SourceFile::new("junk.png", "image/png", b"not a png".to_vec(), Utc::now());
        let results = pipeline
            .process_images(
                vec![junk],
                &PipelineOptions::default(),
                &ProcessingContext::new(UploadDestination::default()),
                Vec::new(),
            )
            .await;

        let summary = BatchSummary::new(2, &results, pipeline.cache_stats());
        assert_eq!((summary.succeeded, summary.warned), (0, 0));
        assert_eq!((summary.failed, summary.skipped), (1, 1));
        assert_eq!(summary.files[0].status, ProcessingStatus::Error);
        assert!(!summary.files[0].errors.is_empty());

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["files"][0]["status"], "error");
        assert_eq!(json["cache"]["validation_count"], 1);
    }

    fn flat_png(name: &str, width: u32, height: u32) -> SourceFile {
        let raster =
            RasterBuffer::from_raw(width, height, vec![180u8; (width * height * 4) as usize]).unwrap();
        let data = StandardCodec::new().encode(&raster, OutputFormat::Png, 0.9).unwrap();
        SourceFile::new(name, "image/png", data, Utc::now())
    }

    #[tokio::test]
    async fn test_summary_counts_warnings_separately() {
        let pipeline = ImagePipeline::new(
            Arc::new(StandardCodec::new()),
            Arc::new(InMemoryBlobStore::new()),
            Arc::new(InMemoryRecordStore::new()),
        );
        let clean = flat_png("hall.png", 1280, 960);
        let tiny = flat_png("swatch.png", 120, 120);
        assert!(clean.size() >= 1024);
        assert!(tiny.size() < 1024);

        let results = pipeline
            .process_images(
                vec![clean, tiny],
                &PipelineOptions::default(),
                &ProcessingContext::new(UploadDestination::default()),
                Vec::new(),
            )
            .await;

        assert_eq!(results[0].status, ProcessingStatus::Success, "{:?}", results[0].warnings);
        assert_eq!(results[1].status, ProcessingStatus::Warning);
        assert!(results[1].is_success() && results[1].has_warnings());

        let summary = BatchSummary::new(2, &results, pipeline.cache_stats());
        assert_eq!((summary.succeeded, summary.warned, summary.failed), (1, 1, 0));
        assert_eq!(summary.files[1].warnings.len(), 1);
    }
}
