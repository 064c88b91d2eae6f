use crate::codec::{CodecError, ImageCodec, RasterBuffer};
use agentdesk_core::constants::{
    SMALL_PNG_THRESHOLD_BYTES, TARGET_SIZE_FALLBACK_QUALITY, TARGET_SIZE_MAX_ATTEMPTS,
    TARGET_SIZE_MIN_QUALITY, TARGET_SIZE_QUALITY_STEP,
};
use agentdesk_core::{ImageType, OutputFormat};

/// Format selector for re-encoded images
pub struct FormatSelector;

impl FormatSelector {
    /// Resolve `Auto` to a concrete format; pinned formats are returned as is.
    ///
    /// Small PNGs stay PNG (they are likely to carry transparency), everything
    /// else goes to WebP when the codec can encode it, and JPEG otherwise.
    pub fn select(
        requested: OutputFormat,
        source: Option<ImageType>,
        size_bytes: u64,
        codec: &dyn ImageCodec,
    ) -> OutputFormat {
        if requested != OutputFormat::Auto {
            return requested;
        }

        if source == Some(ImageType::Png) && size_bytes < SMALL_PNG_THRESHOLD_BYTES {
            return OutputFormat::Png;
        }

        if codec.can_encode(OutputFormat::WebP) {
            OutputFormat::WebP
        } else {
            OutputFormat::Jpeg
        }
    }
}

/// Result of fitting an encode under a byte budget
#[derive(Debug, Clone)]
pub struct TargetSizeOutcome {
    pub data: Vec<u8>,
    pub quality: f32,
    /// Quality reductions performed.
    pub attempts: u32,
    pub dimensions: (u32, u32),
    /// Whether the dimension-scaling fallback produced the final bytes.
    pub resized: bool,
    pub reached: bool,
}

/// Iterative quality search followed by a single dimension-scaling fallback.
pub struct TargetSizeSearch;

impl TargetSizeSearch {
    /// `initial` is the encode of `raster` at `quality`.
    pub fn run(
        codec: &dyn ImageCodec,
        raster: &RasterBuffer,
        format: OutputFormat,
        quality: f32,
        initial: Vec<u8>,
        target: u64,
    ) -> Result<TargetSizeOutcome, CodecError> {
        let mut data = initial;
        let mut quality = quality;
        let mut attempts = 0;

        if !format.is_lossless() {
            while data.len() as u64 > target
                && attempts < TARGET_SIZE_MAX_ATTEMPTS
                && quality > TARGET_SIZE_MIN_QUALITY
            {
                quality = (quality * TARGET_SIZE_QUALITY_STEP).max(TARGET_SIZE_MIN_QUALITY);
                data = codec.encode(raster, format, quality)?;
                attempts += 1;

                tracing::debug!(
                    attempt = attempts,
                    quality = quality,
                    size_bytes = data.len(),
                    target_bytes = target,
                    "Target size search step"
                );
            }
        }

        let mut dimensions = raster.dimensions();
        let mut resized = false;

        if data.len() as u64 > target {
            let scale = (target as f64 / data.len() as f64).sqrt();
            let width = ((dimensions.0 as f64 * scale).round() as u32).max(1);
            let height = ((dimensions.1 as f64 * scale).round() as u32).max(1);

            let smaller = codec.resize(raster, width, height);
            let candidate = codec.encode(&smaller, format, TARGET_SIZE_FALLBACK_QUALITY)?;

            tracing::debug!(
                width = width,
                height = height,
                size_bytes = candidate.len(),
                target_bytes = target,
                "Target size fallback resize"
            );

            if candidate.len() < data.len() {
                data = candidate;
                dimensions = (width, height);
                quality = TARGET_SIZE_FALLBACK_QUALITY;
                resized = true;
            }
        }

        let reached = data.len() as u64 <= target;
        Ok(TargetSizeOutcome {
            data,
            quality,
            attempts,
            dimensions,
            resized,
            reached,
        })
    }
}
