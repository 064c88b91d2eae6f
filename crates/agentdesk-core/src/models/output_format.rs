use super::ImageType;
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};

/// Output format for re-encoded images
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Jpeg,
    Png,
    WebP,
    #[default]
    Auto, // Picked per file from source type, size and encoder support
}

impl OutputFormat {
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "jpeg" | "jpg" => Ok(OutputFormat::Jpeg),
            "png" => Ok(OutputFormat::Png),
            "webp" => Ok(OutputFormat::WebP),
            "auto" => Ok(OutputFormat::Auto),
            _ => Err(anyhow!("Invalid output format: {}", s)),
        }
    }

    /// Concrete image type for a pinned format, `None` for `Auto`.
    pub fn image_type(self) -> Option<ImageType> {
        match self {
            OutputFormat::Jpeg => Some(ImageType::Jpeg),
            OutputFormat::Png => Some(ImageType::Png),
            OutputFormat::WebP => Some(ImageType::WebP),
            OutputFormat::Auto => None,
        }
    }

    pub fn to_mime_type(self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "image/jpeg",
            OutputFormat::Png => "image/png",
            OutputFormat::WebP => "image/webp",
            OutputFormat::Auto => "image/jpeg",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Jpeg | OutputFormat::Auto => "jpg",
            OutputFormat::Png => "png",
            OutputFormat::WebP => "webp",
        }
    }

    pub fn is_lossless(self) -> bool {
        matches!(self, OutputFormat::Png)
    }
}

impl Display for OutputFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            OutputFormat::Jpeg => write!(f, "jpeg"),
            OutputFormat::Png => write!(f, "png"),
            OutputFormat::WebP => write!(f, "webp"),
            OutputFormat::Auto => write!(f, "auto"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        assert_eq!(OutputFormat::parse("JPG").unwrap(), OutputFormat::Jpeg);
        assert_eq!(OutputFormat::parse("webp").unwrap(), OutputFormat::WebP);
        assert_eq!(OutputFormat::parse("auto").unwrap(), OutputFormat::Auto);
        assert!(OutputFormat::parse("avif").is_err());
    }

    #[test]
    fn test_image_type_mapping() {
        assert_eq!(OutputFormat::Png.image_type(), Some(ImageType::Png));
        assert_eq!(OutputFormat::Auto.image_type(), None);
    }

    #[test]
    fn test_mime_and_extension() {
        assert_eq!(OutputFormat::WebP.to_mime_type(), "image/webp");
        assert_eq!(OutputFormat::Jpeg.extension(), "jpg");
        assert!(OutputFormat::Png.is_lossless());
        assert!(!OutputFormat::WebP.is_lossless());
    }
}
