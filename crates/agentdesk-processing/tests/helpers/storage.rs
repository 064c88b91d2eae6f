//! Instrumented collaborators: blob store with failure injection and a
//! concurrency gauge, a record store that always fails, and a counting codec.

use agentdesk_core::{OutputFormat, RecordUpdate, StorageBackend, UploadRecord};
use agentdesk_processing::{CodecError, ImageCodec, ImageInfo, RasterBuffer, StandardCodec};
use agentdesk_storage::{
    BlobStore, InMemoryBlobStore, RecordStore, RecordStoreError, StorageError, StorageResult,
    StoredObject,
};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use uuid::Uuid;

/// In-memory blob store that can delay writes, fail them, and records how
/// many writes ran at once.
#[derive(Default)]
pub struct InstrumentedBlobStore {
    pub inner: InMemoryBlobStore,
    delay: Duration,
    fail_first: AtomicUsize,
    poison: Mutex<Option<Bytes>>,
    puts: AtomicUsize,
    current: AtomicUsize,
    max_concurrent: AtomicUsize,
}

impl InstrumentedBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    /// Fail the next `n` writes.
    pub fn fail_first(self, n: usize) -> Self {
        self.fail_first.store(n, Ordering::SeqCst);
        self
    }

    /// Fail every write whose payload equals `data`.
    pub fn poison(self, data: Bytes) -> Self {
        *self.poison.lock().unwrap() = Some(data);
        self
    }

    pub fn puts(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent.load(Ordering::SeqCst)
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl BlobStore for InstrumentedBlobStore {
    async fn put(
        &self,
        bucket: &str,
        path: &str,
        content_type: &str,
        data: Bytes,
    ) -> StorageResult<StoredObject> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        let _in_flight = InFlight(&self.current);
        self.max_concurrent.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let poisoned = self.poison.lock().unwrap().as_ref() == Some(&data);
        let scheduled_failure = self
            .fail_first
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if poisoned || scheduled_failure {
            return Err(StorageError::UploadFailed("injected failure".to_string()));
        }

        self.inner.put(bucket, path, content_type, data).await
    }

    async fn remove(&self, bucket: &str, paths: &[String]) -> StorageResult<()> {
        self.inner.remove(bucket, paths).await
    }

    async fn exists(&self, bucket: &str, path: &str) -> StorageResult<bool> {
        self.inner.exists(bucket, path).await
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        self.inner.public_url(bucket, path)
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Memory
    }
}

/// Record store whose writes always fail.
pub struct FailingRecordStore;

#[async_trait]
impl RecordStore for FailingRecordStore {
    async fn insert(&self, _record: UploadRecord) -> Result<UploadRecord, RecordStoreError> {
        Err(RecordStoreError::Backend("database unavailable".to_string()))
    }

    async fn update(
        &self,
        id: Uuid,
        _update: &RecordUpdate,
    ) -> Result<UploadRecord, RecordStoreError> {
        Err(RecordStoreError::NotFound(id))
    }

    async fn get(&self, _id: Uuid) -> Result<Option<UploadRecord>, RecordStoreError> {
        Ok(None)
    }

    async fn delete(&self, id: Uuid) -> Result<(), RecordStoreError> {
        Err(RecordStoreError::NotFound(id))
    }

    async fn list_for_listing(
        &self,
        _listing_id: &str,
    ) -> Result<Vec<UploadRecord>, RecordStoreError> {
        Ok(Vec::new())
    }
}

/// Standard codec that counts full decodes.
#[derive(Default)]
pub struct CountingCodec {
    inner: StandardCodec,
    decodes: AtomicUsize,
}

impl CountingCodec {
    pub fn decodes(&self) -> usize {
        self.decodes.load(Ordering::SeqCst)
    }
}

impl ImageCodec for CountingCodec {
    fn probe(&self, data: &[u8]) -> Result<ImageInfo, CodecError> {
        self.inner.probe(data)
    }

    fn decode(&self, data: &[u8]) -> Result<RasterBuffer, CodecError> {
        self.decodes.fetch_add(1, Ordering::SeqCst);
        self.inner.decode(data)
    }

    fn encode(
        &self,
        raster: &RasterBuffer,
        format: OutputFormat,
        quality: f32,
    ) -> Result<Vec<u8>, CodecError> {
        self.inner.encode(raster, format, quality)
    }

    fn resize(&self, raster: &RasterBuffer, width: u32, height: u32) -> RasterBuffer {
        self.inner.resize(raster, width, height)
    }

    fn can_encode(&self, format: OutputFormat) -> bool {
        self.inner.can_encode(format)
    }
}
