use agentdesk_core::ImageType;
use serde::{Deserialize, Serialize};

/// Inferred display layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    Landscape,
    Portrait,
    Square,
}

impl Layout {
    pub fn from_dimensions(width: u32, height: u32) -> Self {
        match width.cmp(&height) {
            std::cmp::Ordering::Greater => Layout::Landscape,
            std::cmp::Ordering::Less => Layout::Portrait,
            std::cmp::Ordering::Equal => Layout::Square,
        }
    }
}

/// Image metadata computed once per file during validation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageMetadata {
    pub width: u32,
    pub height: u32,
    pub aspect_ratio: f64,
    pub size_bytes: u64,
    /// Declared media type of the source file.
    pub content_type: String,
    /// Container format detected from the bytes.
    pub detected_format: Option<ImageType>,
    pub has_exif: bool,
    /// EXIF orientation tag, 1 when absent.
    pub exif_orientation: u8,
    pub layout: Layout,
}

impl ImageMetadata {
    pub fn new(
        width: u32,
        height: u32,
        size_bytes: u64,
        content_type: impl Into<String>,
        detected_format: Option<ImageType>,
        has_exif: bool,
        exif_orientation: u8,
    ) -> Self {
        let aspect_ratio = if height == 0 {
            0.0
        } else {
            width as f64 / height as f64
        };
        Self {
            width,
            height,
            aspect_ratio,
            size_bytes,
            content_type: content_type.into(),
            detected_format,
            has_exif,
            exif_orientation,
            layout: Layout::from_dimensions(width, height),
        }
    }

    pub fn pixel_count(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        assert_eq!(Layout::from_dimensions(1920, 1080), Layout::Landscape);
        assert_eq!(Layout::from_dimensions(1080, 1920), Layout::Portrait);
        assert_eq!(Layout::from_dimensions(500, 500), Layout::Square);
    }

    #[test]
    fn test_new_computes_ratio() {
        let meta = ImageMetadata::new(6000, 4000, 8_000_000, "image/jpeg", Some(ImageType::Jpeg), true, 6);
        assert!((meta.aspect_ratio - 1.5).abs() < f64::EPSILON);
        assert_eq!(meta.layout, Layout::Landscape);
        assert_eq!(meta.pixel_count(), 24_000_000);
    }

    #[test]
    fn test_image_metadata_serialization() {
        let meta = ImageMetadata::new(800, 600, 1024, "image/png", Some(ImageType::Png), false, 1);
        let json = serde_json::to_string(&meta).unwrap();
        assert!(json.contains("\"layout\":\"landscape\""));
        assert!(json.contains("\"detected_format\":\"png\""));
        let back: ImageMetadata = serde_json::from_str(&json).unwrap();
        assert_eq!(back, meta);
    }
}
