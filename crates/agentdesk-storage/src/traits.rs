//! Blob storage abstraction trait
//!
//! This module defines the `BlobStore` trait that all storage backends must implement.

use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Outcome of a successful write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub path: String,
    pub public_url: String,
    pub size_bytes: u64,
}

/// Blob storage abstraction trait
///
/// The uploader only talks to this trait, so the pipeline works with any
/// backend without coupling to its transport.
///
/// **Path format:** see the crate root documentation.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Write `data` at `bucket/path`, replacing any existing object.
    async fn put(
        &self,
        bucket: &str,
        path: &str,
        content_type: &str,
        data: Bytes,
    ) -> StorageResult<StoredObject>;

    /// Remove objects. Missing objects are not an error.
    async fn remove(&self, bucket: &str, paths: &[String]) -> StorageResult<()>;

    /// Check if an object exists
    async fn exists(&self, bucket: &str, path: &str) -> StorageResult<bool>;

    /// Public URL an object is (or would be) served from
    fn public_url(&self, bucket: &str, path: &str) -> String;

    /// Get the backend type
    fn backend_type(&self) -> StorageBackend;
}
