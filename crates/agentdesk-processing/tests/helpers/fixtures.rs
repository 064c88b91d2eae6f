//! Test fixtures: generated listing photos in the formats the pipeline accepts.

use agentdesk_core::{OutputFormat, SourceFile};
use agentdesk_processing::image::exif::attach_exif;
use agentdesk_processing::{ImageCodec, StandardCodec};
use bytes::Bytes;
use chrono::{TimeZone, Utc};
use image::{Rgba, RgbaImage};

/// Smooth gradient; `seed` shifts the colors so each fixture is unique.
pub fn gradient(width: u32, height: u32, seed: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        Rgba([
            ((x + seed * 17) % 256) as u8,
            ((y + seed * 31) % 256) as u8,
            ((x + y + seed) % 256) as u8,
            255,
        ])
    })
}

/// High-entropy raster that compresses poorly, for exercising size limits.
pub fn noise(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        let v = x.wrapping_mul(2_654_435_761) ^ y.wrapping_mul(40_503) ^ (x * y);
        Rgba([v as u8, (v >> 8) as u8, (v >> 16) as u8, 255])
    })
}

pub fn encode(raster: &RgbaImage, format: OutputFormat) -> Vec<u8> {
    StandardCodec::new()
        .encode(raster, format, 0.9)
        .expect("fixture encode")
}

pub fn source(name: &str, content_type: &str, data: Vec<u8>) -> SourceFile {
    SourceFile::new(
        name,
        content_type,
        data,
        Utc.with_ymd_and_hms(2024, 6, 1, 9, 30, 0).unwrap(),
    )
}

pub fn png_file(name: &str, width: u32, height: u32, seed: u32) -> SourceFile {
    source(name, "image/png", encode(&gradient(width, height, seed), OutputFormat::Png))
}

pub fn jpeg_file(name: &str, width: u32, height: u32, seed: u32) -> SourceFile {
    source(name, "image/jpeg", encode(&gradient(width, height, seed), OutputFormat::Jpeg))
}

/// Minimal little-endian TIFF block with a single orientation tag.
pub fn tiff_with_orientation(orientation: u16) -> Vec<u8> {
    let mut tiff = vec![0x49, 0x49, 0x2A, 0x00, 0x08, 0x00, 0x00, 0x00];
    tiff.extend_from_slice(&[0x01, 0x00]);
    tiff.extend_from_slice(&[0x12, 0x01, 0x03, 0x00, 0x01, 0x00, 0x00, 0x00]);
    tiff.extend_from_slice(&orientation.to_le_bytes());
    tiff.extend_from_slice(&[0x00, 0x00]);
    tiff.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]);
    tiff
}

/// JPEG carrying an EXIF block with the given orientation.
pub fn exif_jpeg_file(name: &str, width: u32, height: u32, orientation: u16) -> SourceFile {
    let plain = encode(&gradient(width, height, 3), OutputFormat::Jpeg);
    let data = attach_exif(
        &plain,
        Bytes::from(tiff_with_orientation(orientation)),
        OutputFormat::Jpeg,
    )
    .expect("attach exif");
    source(name, "image/jpeg", data)
}
