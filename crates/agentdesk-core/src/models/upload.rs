use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Where an upload lands in the blob store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadDestination {
    pub bucket: String,
    pub folder: String,
    /// Listing the image belongs to; scopes the primary-image flag.
    pub listing_id: Option<String>,
}

impl UploadDestination {
    pub fn new(bucket: impl Into<String>, folder: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            folder: folder.into(),
            listing_id: None,
        }
    }

    pub fn with_listing(mut self, listing_id: impl Into<String>) -> Self {
        self.listing_id = Some(listing_id.into());
        self
    }
}

impl Default for UploadDestination {
    fn default() -> Self {
        Self::new("listing-images", "listings")
    }
}

/// A stored thumbnail derived from an uploaded image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThumbnailRecord {
    pub size_label: String,
    pub url: String,
    pub path: String,
}

/// Persisted record of a completed upload.
///
/// Only created after the blob write succeeded. Afterwards it changes only
/// through [`RecordUpdate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadRecord {
    pub id: Uuid,
    pub remote_url: String,
    pub storage_path: String,
    pub bucket: String,
    pub content_type: String,
    pub size_bytes: u64,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub thumbnails: Vec<ThumbnailRecord>,
    pub listing_id: Option<String>,
    pub original_name: String,
    pub is_primary: bool,
    pub sort_order: i32,
    pub alt_text: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl UploadRecord {
    /// Every blob path owned by this record, main image first.
    pub fn all_paths(&self) -> Vec<String> {
        std::iter::once(self.storage_path.clone())
            .chain(self.thumbnails.iter().map(|t| t.path.clone()))
            .collect()
    }

    pub fn apply(&mut self, update: &RecordUpdate) {
        if let Some(is_primary) = update.is_primary {
            self.is_primary = is_primary;
        }
        if let Some(sort_order) = update.sort_order {
            self.sort_order = sort_order;
        }
        if let Some(alt_text) = &update.alt_text {
            self.alt_text = alt_text.clone();
        }
    }
}

/// Explicit metadata change on an existing record. `None` leaves a field as is;
/// `alt_text: Some(None)` clears the alt text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordUpdate {
    pub is_primary: Option<bool>,
    pub sort_order: Option<i32>,
    pub alt_text: Option<Option<String>>,
}

impl RecordUpdate {
    pub fn is_empty(&self) -> bool {
        self.is_primary.is_none() && self.sort_order.is_none() && self.alt_text.is_none()
    }
}
