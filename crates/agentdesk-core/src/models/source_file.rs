use super::ImageType;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A user-selected image file.
///
/// The pipeline never mutates a `SourceFile`; optimized output is a new
/// `SourceFile` sharing nothing with the input except its modification time.
/// `data` is reference counted so clones are cheap and point at the same buffer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceFile {
    pub name: String,
    pub content_type: String,
    #[serde(skip)]
    pub data: Bytes,
    pub modified_at: DateTime<Utc>,
}

impl SourceFile {
    pub fn new(
        name: impl Into<String>,
        content_type: impl Into<String>,
        data: impl Into<Bytes>,
        modified_at: DateTime<Utc>,
    ) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            data: data.into(),
            modified_at,
        }
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    /// Lowercased filename extension, if any.
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
    }

    /// Filename without its extension.
    pub fn stem(&self) -> &str {
        Path::new(&self.name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&self.name)
    }

    pub fn declared_type(&self) -> Option<ImageType> {
        ImageType::from_mime(&self.content_type)
    }

    /// Content-derived identity used for caching: `name:size:modified_millis`.
    pub fn fingerprint(&self) -> String {
        format!(
            "{}:{}:{}",
            self.name,
            self.size(),
            self.modified_at.timestamp_millis()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample(name: &str) -> SourceFile {
        SourceFile::new(
            name,
            "image/jpeg",
            vec![1u8, 2, 3],
            Utc.timestamp_millis_opt(1_700_000_000_000).unwrap(),
        )
    }

    #[test]
    fn test_extension_and_stem() {
        let file = sample("Front Porch.JPG");
        assert_eq!(file.extension().as_deref(), Some("jpg"));
        assert_eq!(file.stem(), "Front Porch");

        let bare = sample("README");
        assert_eq!(bare.extension(), None);
        assert_eq!(bare.stem(), "README");
    }

    #[test]
    fn test_fingerprint_is_stable() {
        let a = sample("kitchen.jpg");
        let b = sample("kitchen.jpg");
        assert_eq!(a.fingerprint(), "kitchen.jpg:3:1700000000000");
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), sample("garage.jpg").fingerprint());
    }

    #[test]
    fn test_clone_shares_buffer() {
        let a = sample("a.jpg");
        let b = a.clone();
        assert_eq!(a.data.as_ptr(), b.data.as_ptr());
        assert_eq!(b.size(), 3);
        assert_eq!(b.declared_type(), Some(ImageType::Jpeg));
    }
}
