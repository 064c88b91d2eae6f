use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};

/// Image container types accepted by the ingestion pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageType {
    Jpeg,
    Png,
    WebP,
    Heic,
}

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

impl ImageType {
    pub const ALL: [ImageType; 4] = [
        ImageType::Jpeg,
        ImageType::Png,
        ImageType::WebP,
        ImageType::Heic,
    ];

    /// Map a declared MIME type to an image type. Parameters (`; charset=...`) are ignored.
    pub fn from_mime(content_type: &str) -> Option<Self> {
        let mime = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_lowercase();
        match mime.as_str() {
            "image/jpeg" | "image/jpg" | "image/pjpeg" => Some(ImageType::Jpeg),
            "image/png" => Some(ImageType::Png),
            "image/webp" => Some(ImageType::WebP),
            "image/heic" | "image/heif" => Some(ImageType::Heic),
            _ => None,
        }
    }

    pub fn from_extension(extension: &str) -> Option<Self> {
        let ext = extension.trim_start_matches('.').to_lowercase();
        ImageType::ALL
            .into_iter()
            .find(|t| t.extensions().contains(&ext.as_str()))
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            ImageType::Jpeg => "image/jpeg",
            ImageType::Png => "image/png",
            ImageType::WebP => "image/webp",
            ImageType::Heic => "image/heic",
        }
    }

    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            ImageType::Jpeg => &["jpg", "jpeg"],
            ImageType::Png => &["png"],
            ImageType::WebP => &["webp"],
            ImageType::Heic => &["heic", "heif"],
        }
    }

    pub fn default_extension(self) -> &'static str {
        self.extensions()[0]
    }

    /// Check the leading magic bytes against this type's container signature.
    pub fn matches_signature(self, data: &[u8]) -> bool {
        match self {
            ImageType::Jpeg => data.starts_with(&[0xFF, 0xD8, 0xFF]),
            ImageType::Png => data.starts_with(&PNG_SIGNATURE),
            ImageType::WebP => data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP",
            ImageType::Heic => data.len() >= 8 && &data[4..8] == b"ftyp",
        }
    }

    /// Detect the container type from magic bytes alone.
    pub fn detect(data: &[u8]) -> Option<Self> {
        ImageType::ALL
            .into_iter()
            .find(|t| t.matches_signature(data))
    }
}

impl Display for ImageType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            ImageType::Jpeg => write!(f, "jpeg"),
            ImageType::Png => write!(f, "png"),
            ImageType::WebP => write!(f, "webp"),
            ImageType::Heic => write!(f, "heic"),
        }
    }
}
