use crate::models::OutputFormat;
use crate::options::{PipelineOptions, ThumbnailSpec};
use crate::storage_types::StorageBackend;
use std::env;

/// Runtime configuration for the ingestion pipeline and its storage backend.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub options: PipelineOptions,
    pub storage_backend: StorageBackend,
    pub storage_bucket: String,
    pub storage_folder: String,
    pub local_storage_path: String,
    pub local_storage_base_url: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            options: PipelineOptions::default(),
            storage_backend: StorageBackend::Local,
            storage_bucket: "listing-images".to_string(),
            storage_folder: "listings".to_string(),
            local_storage_path: "./data/media".to_string(),
            local_storage_base_url: "http://localhost:4000/media".to_string(),
        }
    }
}

impl PipelineConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup. Unset or unparsable numeric
    /// values fall back to defaults; malformed enums and lists are errors.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let mut options = PipelineOptions::default();

        let parse_or = |key: &str, default: u64| -> u64 {
            lookup(key)
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(default)
        };
        let parse_bool_or = |key: &str, default: bool| -> bool {
            lookup(key)
                .map(|v| v.trim().to_lowercase())
                .and_then(|v| match v.as_str() {
                    "1" | "true" | "yes" | "on" => Some(true),
                    "0" | "false" | "no" | "off" => Some(false),
                    _ => None,
                })
                .unwrap_or(default)
        };

        let max_file_size_mb = parse_or("IMAGE_MAX_FILE_SIZE_MB", 10);
        options.validation.max_file_size = max_file_size_mb * 1024 * 1024;
        options.validation.check_for_malware = parse_bool_or(
            "IMAGE_CHECK_FOR_MALWARE",
            options.validation.check_for_malware,
        );

        options.optimization.max_width =
            parse_or("IMAGE_MAX_WIDTH", options.optimization.max_width as u64) as u32;
        options.optimization.max_height =
            parse_or("IMAGE_MAX_HEIGHT", options.optimization.max_height as u64) as u32;
        options.optimization.quality = lookup("IMAGE_QUALITY")
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(options.optimization.quality);
        if let Some(format) = lookup("IMAGE_OUTPUT_FORMAT") {
            options.optimization.format = OutputFormat::parse(format.trim())?;
        }
        options.optimization.strip_exif =
            parse_bool_or("IMAGE_STRIP_EXIF", options.optimization.strip_exif);
        options.optimization.enable_sharpening =
            parse_bool_or("IMAGE_SHARPEN", options.optimization.enable_sharpening);
        options.optimization.enable_noise_reduction = parse_bool_or(
            "IMAGE_NOISE_REDUCTION",
            options.optimization.enable_noise_reduction,
        );
        options.optimization.target_file_size = parse_or(
            "IMAGE_TARGET_FILE_SIZE",
            options.optimization.target_file_size,
        );

        options.batch.max_concurrent_uploads = parse_or(
            "MAX_CONCURRENT_UPLOADS",
            options.batch.max_concurrent_uploads as u64,
        ) as usize;
        options.batch.retry_attempts =
            parse_or("UPLOAD_RETRY_ATTEMPTS", options.batch.retry_attempts as u64) as u32;
        options.batch.enable_parallel_processing = parse_bool_or(
            "ENABLE_PARALLEL_PROCESSING",
            options.batch.enable_parallel_processing,
        );

        options.upload.retry_delay_ms =
            parse_or("UPLOAD_RETRY_DELAY_MS", options.upload.retry_delay_ms);
        if let Some(sizes) = lookup("THUMBNAIL_SIZES") {
            options.upload.thumbnails = ThumbnailSpec::parse_list(&sizes)?;
        }

        let storage_backend = match lookup("STORAGE_BACKEND") {
            Some(backend) => backend.trim().parse()?,
            None => defaults.storage_backend,
        };

        Ok(Self {
            options,
            storage_backend,
            storage_bucket: lookup("STORAGE_BUCKET").unwrap_or(defaults.storage_bucket),
            storage_folder: lookup("STORAGE_FOLDER").unwrap_or(defaults.storage_folder),
            local_storage_path: lookup("LOCAL_STORAGE_PATH").unwrap_or(defaults.local_storage_path),
            local_storage_base_url: lookup("LOCAL_STORAGE_BASE_URL")
                .unwrap_or(defaults.local_storage_base_url),
        })
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        let opts = &self.options;

        if opts.validation.max_file_size == 0 {
            return Err(anyhow::anyhow!("IMAGE_MAX_FILE_SIZE_MB must be greater than 0"));
        }

        let (min, max) = (opts.validation.min_dimensions, opts.validation.max_dimensions);
        if min.width > max.width || min.height > max.height {
            return Err(anyhow::anyhow!(
                "Minimum dimensions {}x{} exceed maximum {}x{}",
                min.width,
                min.height,
                max.width,
                max.height
            ));
        }

        let ratios = opts.validation.allowed_aspect_ratios;
        if ratios.min <= 0.0 || ratios.min > ratios.max {
            return Err(anyhow::anyhow!(
                "Invalid aspect ratio range {}-{}",
                ratios.min,
                ratios.max
            ));
        }

        if opts.optimization.max_width == 0 || opts.optimization.max_height == 0 {
            return Err(anyhow::anyhow!(
                "IMAGE_MAX_WIDTH and IMAGE_MAX_HEIGHT must be greater than 0"
            ));
        }

        if !(0.0..=1.0).contains(&opts.optimization.quality) || opts.optimization.quality == 0.0 {
            return Err(anyhow::anyhow!(
                "IMAGE_QUALITY must be in (0, 1], got {}",
                opts.optimization.quality
            ));
        }

        if opts.batch.max_concurrent_uploads == 0 {
            return Err(anyhow::anyhow!("MAX_CONCURRENT_UPLOADS must be at least 1"));
        }

        if opts.batch.retry_attempts == 0 {
            return Err(anyhow::anyhow!("UPLOAD_RETRY_ATTEMPTS must be at least 1"));
        }

        for spec in &opts.upload.thumbnails {
            if !(0.0..=1.0).contains(&spec.quality) || spec.quality == 0.0 {
                return Err(anyhow::anyhow!(
                    "Thumbnail '{}' quality must be in (0, 1], got {}",
                    spec.label,
                    spec.quality
                ));
            }
        }

        if self.storage_bucket.trim().is_empty() {
            return Err(anyhow::anyhow!("STORAGE_BUCKET must not be empty"));
        }

        if self.storage_bucket.contains("..") || self.storage_bucket.contains('/') {
            return Err(anyhow::anyhow!(
                "STORAGE_BUCKET must be a single path segment, got '{}'",
                self.storage_bucket
            ));
        }

        Ok(())
    }
}
