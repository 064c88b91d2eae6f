//! Shared path generation for storage backends.
//!
//! Path format: `{folder}/{file_id}.{ext}` for main images and
//! `{folder}/thumbnails/{label}/{file_id}.{ext}` for thumbnails.

use crate::traits::{StorageError, StorageResult};
use uuid::Uuid;

fn normalize_folder(folder: &str) -> &str {
    folder.trim_matches('/')
}

fn join(folder: &str, rest: &str) -> String {
    let folder = normalize_folder(folder);
    if folder.is_empty() {
        rest.to_string()
    } else {
        format!("{}/{}", folder, rest)
    }
}

/// Generate the storage path of a main image.
pub fn generate_storage_path(folder: &str, file_id: Uuid, extension: &str) -> String {
    join(folder, &format!("{}.{}", file_id, extension))
}

/// Generate the storage path of a thumbnail rendition.
pub fn thumbnail_path(folder: &str, label: &str, file_id: Uuid, extension: &str) -> String {
    join(
        folder,
        &format!("thumbnails/{}/{}.{}", label, file_id, extension),
    )
}

/// Reject paths that could escape the bucket root.
pub fn validate_path(path: &str) -> StorageResult<()> {
    if path.is_empty() {
        return Err(StorageError::InvalidKey("Storage path is empty".to_string()));
    }
    if path.contains("..") || path.starts_with('/') || path.contains('\\') {
        return Err(StorageError::InvalidKey(format!(
            "Storage path contains invalid characters: {}",
            path
        )));
    }
    Ok(())
}
