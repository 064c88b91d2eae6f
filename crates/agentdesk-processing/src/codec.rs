//! Raster codec capability.
//!
//! Everything that touches encoded bytes goes through [`ImageCodec`], so the
//! optimizer and validator never depend on a particular image library.

use crate::image::resize::select_filter;
use agentdesk_core::{ImageType, OutputFormat};
use image::buffer::ConvertBuffer;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{imageops, ExtendedColorType, ImageEncoder, ImageFormat, ImageReader, RgbImage, RgbaImage};
use std::io::Cursor;

/// Decoded 8-bit RGBA pixels.
pub type RasterBuffer = RgbaImage;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CodecError {
    #[error("Failed to decode image: {0}")]
    Decode(String),

    #[error("Failed to encode {format} image: {message}")]
    Encode {
        format: OutputFormat,
        message: String,
    },

    #[error("Encoding to {0} is not supported by this codec")]
    Unsupported(OutputFormat),
}

/// Header-level facts about an encoded image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
    pub format: Option<ImageType>,
}

pub trait ImageCodec: Send + Sync {
    /// Read dimensions and container format without decoding pixels.
    fn probe(&self, data: &[u8]) -> Result<ImageInfo, CodecError>;

    fn decode(&self, data: &[u8]) -> Result<RasterBuffer, CodecError>;

    /// Encode at `quality` in `0.0..=1.0`; lossless formats ignore it.
    fn encode(
        &self,
        raster: &RasterBuffer,
        format: OutputFormat,
        quality: f32,
    ) -> Result<Vec<u8>, CodecError>;

    /// Resample to exactly `width` x `height`.
    fn resize(&self, raster: &RasterBuffer, width: u32, height: u32) -> RasterBuffer;

    fn can_encode(&self, format: OutputFormat) -> bool;
}

/// Codec backed by the `image` crate, with lossy WebP through libwebp when the
/// `webp` feature is enabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardCodec;

impl StandardCodec {
    pub fn new() -> Self {
        Self
    }

    fn reader(data: &[u8]) -> Result<ImageReader<Cursor<&[u8]>>, CodecError> {
        ImageReader::new(Cursor::new(data))
            .with_guessed_format()
            .map_err(|e| CodecError::Decode(e.to_string()))
    }

    fn encode_jpeg(raster: &RasterBuffer, quality: f32) -> Result<Vec<u8>, CodecError> {
        let rgb: RgbImage = raster.convert();
        let mut buffer = Vec::new();
        JpegEncoder::new_with_quality(&mut buffer, jpeg_quality(quality))
            .encode_image(&rgb)
            .map_err(|e| CodecError::Encode {
                format: OutputFormat::Jpeg,
                message: e.to_string(),
            })?;
        Ok(buffer)
    }

    fn encode_png(raster: &RasterBuffer) -> Result<Vec<u8>, CodecError> {
        let mut buffer = Vec::new();
        PngEncoder::new(&mut buffer)
            .write_image(
                raster.as_raw(),
                raster.width(),
                raster.height(),
                ExtendedColorType::Rgba8,
            )
            .map_err(|e| CodecError::Encode {
                format: OutputFormat::Png,
                message: e.to_string(),
            })?;
        Ok(buffer)
    }

    #[cfg(feature = "webp")]
    fn encode_webp(raster: &RasterBuffer, quality: f32) -> Result<Vec<u8>, CodecError> {
        let encoder = webp::Encoder::from_rgba(raster.as_raw(), raster.width(), raster.height());
        let encoded = encoder.encode(quality.clamp(0.0, 1.0) * 100.0);
        Ok(encoded.to_vec())
    }

    #[cfg(not(feature = "webp"))]
    fn encode_webp(_raster: &RasterBuffer, _quality: f32) -> Result<Vec<u8>, CodecError> {
        Err(CodecError::Unsupported(OutputFormat::WebP))
    }
}

/// Map `0.0..=1.0` to the JPEG encoder's `1..=100` scale.
pub fn jpeg_quality(quality: f32) -> u8 {
    (quality.clamp(0.0, 1.0) * 100.0).round().max(1.0) as u8
}

fn image_type_from_format(format: ImageFormat) -> Option<ImageType> {
    match format {
        ImageFormat::Jpeg => Some(ImageType::Jpeg),
        ImageFormat::Png => Some(ImageType::Png),
        ImageFormat::WebP => Some(ImageType::WebP),
        _ => None,
    }
}

impl ImageCodec for StandardCodec {
    fn probe(&self, data: &[u8]) -> Result<ImageInfo, CodecError> {
        let reader = Self::reader(data)?;
        let format = reader.format().and_then(image_type_from_format);
        let (width, height) = reader
            .into_dimensions()
            .map_err(|e| CodecError::Decode(e.to_string()))?;
        Ok(ImageInfo {
            width,
            height,
            format,
        })
    }

    fn decode(&self, data: &[u8]) -> Result<RasterBuffer, CodecError> {
        let img = Self::reader(data)?
            .decode()
            .map_err(|e| CodecError::Decode(e.to_string()))?;
        Ok(img.to_rgba8())
    }

    fn encode(
        &self,
        raster: &RasterBuffer,
        format: OutputFormat,
        quality: f32,
    ) -> Result<Vec<u8>, CodecError> {
        match format {
            OutputFormat::Jpeg => Self::encode_jpeg(raster, quality),
            OutputFormat::Png => Self::encode_png(raster),
            OutputFormat::WebP => Self::encode_webp(raster, quality),
            OutputFormat::Auto => Err(CodecError::Unsupported(OutputFormat::Auto)),
        }
    }

    fn resize(&self, raster: &RasterBuffer, width: u32, height: u32) -> RasterBuffer {
        let (width, height) = (width.max(1), height.max(1));
        if (width, height) == raster.dimensions() {
            return raster.clone();
        }
        let filter = select_filter(raster.width(), raster.height(), width, height);
        imageops::resize(raster, width, height, filter)
    }

    fn can_encode(&self, format: OutputFormat) -> bool {
        match format {
            OutputFormat::Jpeg | OutputFormat::Png => true,
            OutputFormat::WebP => cfg!(feature = "webp"),
            OutputFormat::Auto => false,
        }
    }
}
