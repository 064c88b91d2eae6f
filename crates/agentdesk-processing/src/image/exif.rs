//! EXIF detection, orientation lookup and segment transplanting.

use agentdesk_core::constants::SCAN_WINDOW_BYTES;
use agentdesk_core::{ImageType, OutputFormat};
use bytes::Bytes;
use img_parts::jpeg::Jpeg;
use img_parts::png::Png;
use img_parts::webp::WebP;
use img_parts::ImageEXIF;
use std::io::Cursor;

const JPEG_EXIF_SIGNATURE: &[u8] = b"Exif\0\0";
const PNG_EXIF_CHUNK: &[u8] = b"eXIf";
const WEBP_EXIF_CHUNK: &[u8] = b"EXIF";

/// Look for an embedded EXIF block within the first `SCAN_WINDOW_BYTES`.
pub fn has_exif(data: &[u8]) -> bool {
    let window = &data[..data.len().min(SCAN_WINDOW_BYTES)];
    let contains = |needle: &[u8]| window.windows(needle.len()).any(|w| w == needle);

    match ImageType::detect(data) {
        Some(ImageType::Png) => contains(PNG_EXIF_CHUNK),
        Some(ImageType::WebP) => contains(WEBP_EXIF_CHUNK),
        _ => contains(JPEG_EXIF_SIGNATURE),
    }
}

/// EXIF orientation tag (1-8), or 1 when absent or out of range.
pub fn read_orientation(data: &[u8]) -> u8 {
    let mut cursor = Cursor::new(data);
    let exif = match exif::Reader::new().read_from_container(&mut cursor) {
        Ok(exif) => exif,
        Err(_) => return 1,
    };

    exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)
        .and_then(|field| field.value.get_uint(0))
        .filter(|v| (1..=8).contains(v))
        .map(|v| v as u8)
        .unwrap_or(1)
}

/// Raw EXIF payload (TIFF structure, without the `Exif\0\0` prefix).
pub fn extract_exif(data: &[u8]) -> Option<Bytes> {
    let bytes = Bytes::copy_from_slice(data);
    match ImageType::detect(data)? {
        ImageType::Jpeg => Jpeg::from_bytes(bytes).ok()?.exif(),
        ImageType::Png => Png::from_bytes(bytes).ok()?.exif(),
        ImageType::WebP => WebP::from_bytes(bytes).ok()?.exif(),
        ImageType::Heic => None,
    }
}

/// Re-attach an EXIF payload to freshly encoded output.
///
/// Returns `None` when the output format cannot carry it or the encoded bytes
/// could not be parsed back.
pub fn attach_exif(encoded: &[u8], exif: Bytes, format: OutputFormat) -> Option<Vec<u8>> {
    let bytes = Bytes::copy_from_slice(encoded);
    match format {
        OutputFormat::Jpeg => {
            let mut jpeg = Jpeg::from_bytes(bytes).ok()?;
            jpeg.set_exif(Some(exif));
            Some(jpeg.encoder().bytes().to_vec())
        }
        OutputFormat::Png => {
            let mut png = Png::from_bytes(bytes).ok()?;
            png.set_exif(Some(exif));
            Some(png.encoder().bytes().to_vec())
        }
        OutputFormat::WebP | OutputFormat::Auto => None,
    }
}

/// Minimal little-endian TIFF block holding only an orientation tag.
#[cfg(test)]
pub(crate) fn tiff_with_orientation(orientation: u16) -> Vec<u8> {
    let mut tiff = vec![0x49, 0x49, 0x2A, 0x00, 0x08, 0x00, 0x00, 0x00];
    tiff.extend_from_slice(&[0x01, 0x00]);
    tiff.extend_from_slice(&[0x12, 0x01, 0x03, 0x00, 0x01, 0x00, 0x00, 0x00]);
    tiff.extend_from_slice(&orientation.to_le_bytes());
    tiff.extend_from_slice(&[0x00, 0x00]);
    tiff.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]);
    tiff
}
