//! agentdesk-ingest: validate, optimize and upload listing photos.
//!
//! Configuration comes from the environment (and `.env`); flags override it.
//! Press Ctrl-C once to stop dispatching new files, twice to cancel uploads.

use agentdesk_cli::{init_tracing, load_source_files, progress_logger, BatchSummary};
use agentdesk_core::{OutputFormat, PipelineConfig, StorageBackend, ThumbnailSpec, UploadDestination};
use agentdesk_processing::{ImagePipeline, ProcessingContext, StandardCodec};
use agentdesk_storage::{create_blob_store, InMemoryRecordStore};
use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "agentdesk-ingest")]
#[command(about = "Validate, optimize and upload listing images")]
struct Args {
    /// Image files or directories of images
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Listing the images belong to
    #[arg(long)]
    listing_id: Option<String>,

    /// Destination bucket (overrides STORAGE_BUCKET)
    #[arg(long)]
    bucket: Option<String>,

    /// Destination folder inside the bucket (overrides STORAGE_FOLDER)
    #[arg(long)]
    folder: Option<String>,

    /// Maximum files processed at once
    #[arg(long)]
    max_concurrent: Option<usize>,

    /// Process files one after another
    #[arg(long)]
    sequential: bool,

    /// Output format: auto, jpeg, png or webp
    #[arg(long)]
    format: Option<String>,

    /// Encoder quality between 0.0 and 1.0
    #[arg(long)]
    quality: Option<f32>,

    #[arg(long)]
    max_width: Option<u32>,

    #[arg(long)]
    max_height: Option<u32>,

    /// Apply a sharpening filter after resizing
    #[arg(long)]
    sharpen: bool,

    /// Apply a noise reduction filter after resizing
    #[arg(long)]
    denoise: bool,

    /// Keep EXIF metadata (JPEG and PNG output only)
    #[arg(long)]
    keep_exif: bool,

    /// Upper bound for the optimized file size in bytes
    #[arg(long, value_name = "BYTES")]
    target_size: Option<u64>,

    /// Thumbnail sizes, e.g. "small:150x150,medium:300x300@0.75"
    #[arg(long, value_name = "SPECS")]
    thumbnails: Option<String>,

    /// Upload to memory instead of the configured backend
    #[arg(long)]
    dry_run: bool,
}

fn apply_overrides(config: &mut PipelineConfig, args: &Args) -> anyhow::Result<()> {
    let options = &mut config.options;

    if let Some(n) = args.max_concurrent {
        options.batch.max_concurrent_uploads = n;
    }
    if args.sequential {
        options.batch.enable_parallel_processing = false;
    }
    if let Some(format) = &args.format {
        options.optimization.format = OutputFormat::parse(format)?;
    }
    if let Some(quality) = args.quality {
        options.optimization.quality = quality;
    }
    if let Some(width) = args.max_width {
        options.optimization.max_width = width;
    }
    if let Some(height) = args.max_height {
        options.optimization.max_height = height;
    }
    options.optimization.enable_sharpening |= args.sharpen;
    options.optimization.enable_noise_reduction |= args.denoise;
    if args.keep_exif {
        options.optimization.strip_exif = false;
    }
    if let Some(target) = args.target_size {
        options.optimization.target_file_size = target;
    }
    if let Some(specs) = &args.thumbnails {
        options.upload.thumbnails = ThumbnailSpec::parse_list(specs)?;
    }

    if let Some(bucket) = &args.bucket {
        config.storage_bucket = bucket.clone();
    }
    if let Some(folder) = &args.folder {
        config.storage_folder = folder.clone();
    }
    if args.dry_run {
        config.storage_backend = StorageBackend::Memory;
    }

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();
    let args = Args::parse();

    let mut config = PipelineConfig::from_env().context("Failed to load configuration")?;
    apply_overrides(&mut config, &args)?;
    config.validate().context("Invalid configuration")?;

    let blobs = create_blob_store(&config)
        .await
        .context("Failed to initialize storage backend")?;
    tracing::info!(backend = %config.storage_backend, bucket = %config.storage_bucket, "Storage ready");

    let pipeline = Arc::new(ImagePipeline::new(
        Arc::new(StandardCodec::new()),
        blobs,
        Arc::new(InMemoryRecordStore::new()),
    ));

    let files = load_source_files(&args.paths).await?;
    let total = files.len();

    let signal_pipeline = pipeline.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, finishing in-flight files");
            signal_pipeline.abort();
        }
        if tokio::signal::ctrl_c().await.is_ok() {
            let cancelled = signal_pipeline.cancel_all_uploads();
            tracing::warn!(cancelled = cancelled, "Interrupted again, cancelling uploads");
        }
    });

    let mut destination = UploadDestination::new(&config.storage_bucket, &config.storage_folder);
    if let Some(listing_id) = &args.listing_id {
        destination = destination.with_listing(listing_id);
    }
    let context = ProcessingContext::new(destination);

    let results = pipeline
        .process_images(files, &config.options, &context, vec![progress_logger()])
        .await;

    let summary = BatchSummary::new(total, &results, pipeline.cache_stats());
    let out = serde_json::to_string_pretty(&summary).context("Serialize summary")?;
    println!("{}", out);

    if summary.failed > 0 {
        anyhow::bail!("{} of {} files failed", summary.failed, total);
    }
    Ok(())
}
