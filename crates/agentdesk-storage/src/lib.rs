//! AgentDesk Storage Library
//!
//! This crate provides the two persistence collaborators of the ingestion
//! pipeline: the `BlobStore` that holds image bytes and the `RecordStore` that
//! holds upload records, with filesystem and in-memory implementations.
//!
//! # Storage path format
//!
//! - **Main image**: `{folder}/{file_id}.{ext}`
//! - **Thumbnail**: `{folder}/thumbnails/{label}/{file_id}.{ext}`
//!
//! Paths are relative to a bucket, must not contain `..` or a leading `/`, and
//! are generated in the `keys` module so all backends stay consistent.

pub mod factory;
pub mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-memory")]
pub mod memory;
pub mod records;
pub mod traits;

// Re-export commonly used types
pub use agentdesk_core::StorageBackend;
pub use factory::create_blob_store;
#[cfg(feature = "storage-local")]
pub use local::LocalBlobStore;
#[cfg(feature = "storage-memory")]
pub use memory::InMemoryBlobStore;
pub use records::{InMemoryRecordStore, RecordStore, RecordStoreError};
pub use traits::{BlobStore, StorageError, StorageResult, StoredObject};
