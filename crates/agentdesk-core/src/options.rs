//! Caller-facing option schema.
//!
//! Every struct here is serializable: the processing cache keys results by the
//! JSON form of the options that produced them.

use crate::models::{ImageType, OutputFormat};
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Inclusive range of accepted width / height ratios
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AspectRatioRange {
    pub min: f64,
    pub max: f64,
}

impl AspectRatioRange {
    pub fn contains(&self, ratio: f64) -> bool {
        ratio >= self.min && ratio <= self.max
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationOptions {
    pub max_file_size: u64,
    pub max_dimensions: Dimensions,
    pub min_dimensions: Dimensions,
    pub allowed_types: Vec<ImageType>,
    pub allowed_aspect_ratios: AspectRatioRange,
    pub check_for_malware: bool,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            max_file_size: 10 * 1024 * 1024, // 10MB
            max_dimensions: Dimensions::new(4096, 4096),
            min_dimensions: Dimensions::new(100, 100),
            allowed_types: ImageType::ALL.to_vec(),
            allowed_aspect_ratios: AspectRatioRange { min: 0.2, max: 5.0 },
            check_for_malware: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizationOptions {
    pub max_width: u32,
    pub max_height: u32,
    /// Encoder quality in `0.0..=1.0`.
    pub quality: f32,
    pub format: OutputFormat,
    pub strip_exif: bool,
    pub enable_sharpening: bool,
    pub enable_noise_reduction: bool,
    /// Desired upper bound on output bytes; `0` disables the search.
    pub target_file_size: u64,
    pub maintain_aspect_ratio: bool,
}

impl Default for OptimizationOptions {
    fn default() -> Self {
        Self {
            max_width: 1920,
            max_height: 1080,
            quality: 0.85,
            format: OutputFormat::Auto,
            strip_exif: true,
            enable_sharpening: false,
            enable_noise_reduction: false,
            target_file_size: 0,
            maintain_aspect_ratio: true,
        }
    }
}

impl OptimizationOptions {
    /// Options used to render a thumbnail from an already optimized image.
    pub fn for_thumbnail(spec: &ThumbnailSpec, format: OutputFormat) -> Self {
        Self {
            max_width: spec.width,
            max_height: spec.height,
            quality: spec.quality,
            format,
            ..Self::default()
        }
    }
}

/// A thumbnail rendition generated next to every upload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThumbnailSpec {
    pub label: String,
    pub width: u32,
    pub height: u32,
    pub quality: f32,
}

impl ThumbnailSpec {
    pub fn new(label: impl Into<String>, width: u32, height: u32, quality: f32) -> Self {
        Self {
            label: label.into(),
            width,
            height,
            quality,
        }
    }

    /// Parse `label:WxH` or `label:WxH@quality`. Quality defaults to 0.8.
    pub fn parse(s: &str) -> Result<Self> {
        let (label, rest) = s
            .split_once(':')
            .ok_or_else(|| anyhow!("Invalid thumbnail spec '{}'. Expected: label:WxH[@quality]", s))?;
        let label = label.trim();
        if label.is_empty() {
            return Err(anyhow!("Thumbnail label must not be empty: '{}'", s));
        }

        let (dims, quality) = match rest.split_once('@') {
            Some((dims, q)) => (
                dims,
                q.trim()
                    .parse::<f32>()
                    .map_err(|_| anyhow!("Invalid thumbnail quality: {}", q))?,
            ),
            None => (rest, 0.8),
        };

        let (w, h) = dims
            .trim()
            .split_once('x')
            .ok_or_else(|| anyhow!("Invalid thumbnail dimensions: {}", dims))?;
        let width = w
            .parse::<u32>()
            .map_err(|_| anyhow!("Invalid thumbnail width: {}", w))?;
        let height = h
            .parse::<u32>()
            .map_err(|_| anyhow!("Invalid thumbnail height: {}", h))?;

        if width == 0 || height == 0 {
            return Err(anyhow!("Thumbnail dimensions must be non-zero: {}", dims));
        }

        Ok(Self::new(label, width, height, quality))
    }

    /// Parse a comma separated list; empty input yields no thumbnails.
    pub fn parse_list(s: &str) -> Result<Vec<Self>> {
        s.split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(Self::parse)
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchOptions {
    pub enable_parallel_processing: bool,
    pub max_concurrent_uploads: usize,
    pub retry_attempts: u32,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            enable_parallel_processing: true,
            max_concurrent_uploads: 3,
            retry_attempts: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadOptions {
    /// Base delay before the second attempt; doubles on every further attempt.
    pub retry_delay_ms: u64,
    pub thumbnails: Vec<ThumbnailSpec>,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            retry_delay_ms: 1000,
            thumbnails: Vec::new(),
        }
    }
}

impl UploadOptions {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// Everything a single `process_image` / `process_images` call needs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineOptions {
    pub validation: ValidationOptions,
    pub optimization: OptimizationOptions,
    pub batch: BatchOptions,
    pub upload: UploadOptions,
}
