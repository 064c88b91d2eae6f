//! Image optimizer: orient, resize, filter, re-encode and fit under a byte budget.

use crate::codec::{CodecError, ImageCodec};
use crate::compression::{FormatSelector, TargetSizeSearch};
use crate::image::{
    convolve, exif, fit_within, step_down_resize, ImageOrientation, NOISE_REDUCTION_KERNEL,
    SHARPEN_KERNEL,
};
use agentdesk_core::{ImageType, OptimizationOptions, OutputFormat, SourceFile};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OptimizationError {
    #[error("Invalid optimization options: {0}")]
    InvalidOptions(String),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("Optimization task failed: {0}")]
    Task(String),
}

/// Output of a successful optimization
#[derive(Debug, Clone, Serialize)]
pub struct OptimizationResult {
    pub output_file: SourceFile,
    pub original_bytes: u64,
    pub output_bytes: u64,
    /// Fraction of bytes saved: `(original_bytes - output_bytes) / original_bytes`.
    /// Negative when re-encoding grew the file.
    pub compression_ratio: f64,
    pub output_format: OutputFormat,
    pub output_dimensions: (u32, u32),
    pub elapsed: Duration,
    pub applied_optimizations: Vec<String>,
}

impl OptimizationResult {
    pub fn bytes_saved(&self) -> i64 {
        self.original_bytes as i64 - self.output_bytes as i64
    }
}

/// CPU-bound image optimizer.
///
/// `optimize` is synchronous; async callers should run it through
/// `tokio::task::spawn_blocking`.
#[derive(Clone)]
pub struct ImageOptimizer {
    codec: Arc<dyn ImageCodec>,
}

impl ImageOptimizer {
    pub fn new(codec: Arc<dyn ImageCodec>) -> Self {
        Self { codec }
    }

    pub fn codec(&self) -> &Arc<dyn ImageCodec> {
        &self.codec
    }

    pub fn optimize(
        &self,
        file: &SourceFile,
        options: &OptimizationOptions,
    ) -> Result<OptimizationResult, OptimizationError> {
        let started = Instant::now();
        Self::check_options(options)?;

        let codec = self.codec.as_ref();
        let source_type = ImageType::detect(&file.data).or_else(|| file.declared_type());
        let format = FormatSelector::select(options.format, source_type, file.size(), codec);
        if !codec.can_encode(format) {
            return Err(CodecError::Unsupported(format).into());
        }

        let mut raster = codec.decode(&file.data)?;
        let mut applied = Vec::new();
        let source_has_exif = exif::has_exif(&file.data);

        if options.strip_exif && source_has_exif {
            let orientation = exif::read_orientation(&file.data);
            if orientation != 1 {
                raster = ImageOrientation::apply(raster, orientation);
                applied.push(format!("Auto-orient: EXIF orientation {}", orientation));
            }
        }

        let (width, height) = raster.dimensions();
        let target = fit_within(
            width,
            height,
            options.max_width,
            options.max_height,
            options.maintain_aspect_ratio,
        );
        if target != (width, height) {
            let (resized, passes) = step_down_resize(codec, &raster, target);
            raster = resized;
            if passes > 1 {
                applied.push(format!(
                    "Resize: {}x{} → {}x{} ({} passes)",
                    width, height, target.0, target.1, passes
                ));
            } else {
                applied.push(format!("Resize: {}x{} → {}x{}", width, height, target.0, target.1));
            }
        }

        if options.enable_noise_reduction {
            raster = convolve(&raster, &NOISE_REDUCTION_KERNEL);
            applied.push("Noise reduction applied".to_string());
        }
        if options.enable_sharpening {
            raster = convolve(&raster, &SHARPEN_KERNEL);
            applied.push("Sharpening applied".to_string());
        }

        let mut data = codec.encode(&raster, format, options.quality)?;
        let mut dimensions = raster.dimensions();
        applied.push(format!(
            "Compression: {} at quality {:.2}",
            format, options.quality
        ));

        if options.target_file_size > 0 && data.len() as u64 > options.target_file_size {
            let outcome = TargetSizeSearch::run(
                codec,
                &raster,
                format,
                options.quality,
                data,
                options.target_file_size,
            )?;

            let mut entry = format!(
                "Target size: {} bytes (limit {}) at quality {:.2} after {} attempts",
                outcome.data.len(),
                options.target_file_size,
                outcome.quality,
                outcome.attempts
            );
            if outcome.resized {
                entry.push_str(&format!(
                    ", scaled to {}x{}",
                    outcome.dimensions.0, outcome.dimensions.1
                ));
            }
            if !outcome.reached {
                entry.push_str(", target not reached");
                tracing::warn!(
                    file = %file.name,
                    size_bytes = outcome.data.len(),
                    target_bytes = options.target_file_size,
                    "Target file size not reached"
                );
            }
            applied.push(entry);

            data = outcome.data;
            dimensions = outcome.dimensions;
        }

        if options.strip_exif {
            if source_has_exif {
                applied.push("EXIF metadata stripped".to_string());
            }
        } else if let Some(payload) = exif::extract_exif(&file.data) {
            match exif::attach_exif(&data, payload, format) {
                Some(with_exif) => {
                    data = with_exif;
                    applied.push("EXIF metadata preserved".to_string());
                }
                None => {
                    tracing::debug!(
                        file = %file.name,
                        format = %format,
                        "EXIF metadata could not be carried into output"
                    );
                }
            }
        }

        let original_bytes = file.size();
        let output_bytes = data.len() as u64;
        let output_file = SourceFile::new(
            format!("{}.{}", file.stem(), format.extension()),
            format.to_mime_type(),
            data,
            file.modified_at,
        );
        let elapsed = started.elapsed();

        tracing::debug!(
            file = %file.name,
            format = %format,
            original_bytes = original_bytes,
            output_bytes = output_bytes,
            width = dimensions.0,
            height = dimensions.1,
            elapsed_ms = elapsed.as_millis() as u64,
            "Image optimized"
        );

        Ok(OptimizationResult {
            output_file,
            original_bytes,
            output_bytes,
            compression_ratio: compression_ratio(original_bytes, output_bytes),
            output_format: format,
            output_dimensions: dimensions,
            elapsed,
            applied_optimizations: applied,
        })
    }

    fn check_options(options: &OptimizationOptions) -> Result<(), OptimizationError> {
        if options.max_width == 0 || options.max_height == 0 {
            return Err(OptimizationError::InvalidOptions(
                "max_width and max_height must be greater than zero".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&options.quality) || options.quality.is_nan() {
            return Err(OptimizationError::InvalidOptions(format!(
                "quality must be within 0.0..=1.0, got {}",
                options.quality
            )));
        }
        Ok(())
    }
}

fn compression_ratio(original_bytes: u64, output_bytes: u64) -> f64 {
    if original_bytes == 0 {
        return 0.0;
    }
    (original_bytes as f64 - output_bytes as f64) / original_bytes as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{RasterBuffer, StandardCodec};
    use bytes::Bytes;
    use chrono::{TimeZone, Utc};
    use image::{Rgba, RgbaImage};

    fn optimizer() -> ImageOptimizer {
        ImageOptimizer::new(Arc::new(StandardCodec::new()))
    }

    fn gradient(width: u32, height: u32) -> RasterBuffer {
        RgbaImage::from_fn(width, height, |x, y| {
            Rgba([(x % 256) as u8, (y % 256) as u8, ((x * y) % 256) as u8, 255])
        })
    }

    fn source(name: &str, raster: &RasterBuffer, format: OutputFormat) -> SourceFile {
        let data = StandardCodec::new().encode(raster, format, 0.95).unwrap();
        SourceFile::new(
            name,
            format.to_mime_type(),
            data,
            Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        )
    }

    fn jpeg_options() -> OptimizationOptions {
        OptimizationOptions {
            format: OutputFormat::Jpeg,
            ..Default::default()
        }
    }

    #[test]
    fn test_large_photo_resized_with_step_down() {
        let file = source("kitchen.png", &gradient(4000, 3000), OutputFormat::Png);
        let result = optimizer().optimize(&file, &jpeg_options()).unwrap();

        assert_eq!(result.output_dimensions, (1440, 1080));
        assert_eq!(result.output_format, OutputFormat::Jpeg);
        assert_eq!(result.output_file.name, "kitchen.jpg");
        assert_eq!(result.output_file.content_type, "image/jpeg");
        assert_eq!(result.output_file.modified_at, file.modified_at);
        assert!(result
            .applied_optimizations
            .iter()
            .any(|s| s.starts_with("Resize: 4000x3000 → 1440x1080")));

        let info = StandardCodec::new().probe(&result.output_file.data).unwrap();
        assert_eq!((info.width, info.height), (1440, 1080));
    }

    #[test]
    fn test_compression_ratio_is_fraction_saved() {
        let file = source("kitchen.png", &gradient(4000, 3000), OutputFormat::Png);
        let result = optimizer().optimize(&file, &jpeg_options()).unwrap();

        assert!(result.output_bytes < result.original_bytes);
        let expected = (result.original_bytes as f64 - result.output_bytes as f64)
            / result.original_bytes as f64;
        assert!((result.compression_ratio - expected).abs() < 1e-9);
        assert!(result.compression_ratio > 0.5);
    }

    #[test]
    fn test_compression_ratio_negative_when_output_grows() {
        let flat = RgbaImage::from_pixel(16, 16, Rgba([200, 200, 200, 255]));
        let file = source("swatch.png", &flat, OutputFormat::Png);
        let result = optimizer().optimize(&file, &jpeg_options()).unwrap();

        assert!(result.output_bytes > result.original_bytes);
        assert!(result.compression_ratio < 0.0);
        assert_eq!(result.bytes_saved(), result.original_bytes as i64 - result.output_bytes as i64);
    }

    #[test]
    fn test_compression_ratio_helper() {
        assert_eq!(compression_ratio(0, 10), 0.0);
        assert!((compression_ratio(1000, 250) - 0.75).abs() < f64::EPSILON);
        assert!((compression_ratio(100, 150) + 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_small_image_not_resized() {
        let file = source("bath.png", &gradient(320, 240), OutputFormat::Png);
        let result = optimizer().optimize(&file, &jpeg_options()).unwrap();
        assert_eq!(result.output_dimensions, (320, 240));
        assert!(!result
            .applied_optimizations
            .iter()
            .any(|s| s.starts_with("Resize")));
    }

    #[test]
    fn test_auto_keeps_small_png() {
        let file = source("plan.png", &gradient(200, 200), OutputFormat::Png);
        let result = optimizer()
            .optimize(&file, &OptimizationOptions::default())
            .unwrap();
        assert_eq!(result.output_format, OutputFormat::Png);
        assert_eq!(result.output_file.name, "plan.png");
    }

    #[test]
    fn test_filters_recorded() {
        let file = source("yard.png", &gradient(64, 64), OutputFormat::Png);
        let options = OptimizationOptions {
            enable_sharpening: true,
            enable_noise_reduction: true,
            ..jpeg_options()
        };
        let result = optimizer().optimize(&file, &options).unwrap();
        let noise = result
            .applied_optimizations
            .iter()
            .position(|s| s == "Noise reduction applied")
            .unwrap();
        let sharpen = result
            .applied_optimizations
            .iter()
            .position(|s| s == "Sharpening applied")
            .unwrap();
        assert!(noise < sharpen);
    }

    #[test]
    fn test_deterministic() {
        let file = source("garage.png", &gradient(300, 200), OutputFormat::Png);
        let first = optimizer().optimize(&file, &jpeg_options()).unwrap();
        let second = optimizer().optimize(&file, &jpeg_options()).unwrap();
        assert_eq!(first.output_file.data, second.output_file.data);
        assert_eq!(first.applied_optimizations, second.applied_optimizations);
    }

    #[test]
    fn test_target_size_recorded() {
        let noisy = RgbaImage::from_fn(256, 256, |x, y| {
            let v = x.wrapping_mul(2_654_435_761) ^ y.wrapping_mul(40_503);
            Rgba([v as u8, (v >> 8) as u8, (v >> 16) as u8, 255])
        });
        let file = source("noise.png", &noisy, OutputFormat::Png);
        let options = OptimizationOptions {
            target_file_size: 8_000,
            ..jpeg_options()
        };
        let result = optimizer().optimize(&file, &options).unwrap();
        assert!(result
            .applied_optimizations
            .iter()
            .any(|s| s.starts_with("Target size:")));
    }

    #[test]
    fn test_exif_stripped_and_auto_oriented() {
        let codec = StandardCodec::new();
        let plain = codec.encode(&gradient(400, 200), OutputFormat::Jpeg, 0.9).unwrap();
        let with_exif = exif::attach_exif(
            &plain,
            Bytes::from(exif::tiff_with_orientation(6)),
            OutputFormat::Jpeg,
        )
        .unwrap();
        let file = SourceFile::new("porch.jpg", "image/jpeg", with_exif, Utc::now());

        let result = optimizer().optimize(&file, &jpeg_options()).unwrap();
        assert_eq!(result.output_dimensions, (200, 400));
        assert!(!exif::has_exif(&result.output_file.data));
        assert!(result
            .applied_optimizations
            .contains(&"EXIF metadata stripped".to_string()));
        assert!(result
            .applied_optimizations
            .contains(&"Auto-orient: EXIF orientation 6".to_string()));
    }

    #[test]
    fn test_exif_preserved_when_requested() {
        let codec = StandardCodec::new();
        let plain = codec.encode(&gradient(400, 200), OutputFormat::Jpeg, 0.9).unwrap();
        let with_exif = exif::attach_exif(
            &plain,
            Bytes::from(exif::tiff_with_orientation(6)),
            OutputFormat::Jpeg,
        )
        .unwrap();
        let file = SourceFile::new("porch.jpg", "image/jpeg", with_exif, Utc::now());

        let options = OptimizationOptions {
            strip_exif: false,
            ..jpeg_options()
        };
        let result = optimizer().optimize(&file, &options).unwrap();
        assert_eq!(result.output_dimensions, (400, 200));
        assert_eq!(exif::read_orientation(&result.output_file.data), 6);
    }

    #[test]
    fn test_invalid_options() {
        let file = source("a.png", &gradient(10, 10), OutputFormat::Png);
        let options = OptimizationOptions {
            quality: 1.5,
            ..Default::default()
        };
        assert!(matches!(
            optimizer().optimize(&file, &options),
            Err(OptimizationError::InvalidOptions(_))
        ));
    }

    #[test]
    fn test_undecodable_input() {
        let file = SourceFile::new("x.jpg", "image/jpeg", vec![0xFF, 0xD8, 0xFF, 0x00], Utc::now());
        assert!(matches!(
            optimizer().optimize(&file, &jpeg_options()),
            Err(OptimizationError::Codec(CodecError::Decode(_)))
        ));
    }
}
