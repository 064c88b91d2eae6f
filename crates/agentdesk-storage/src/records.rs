//! Upload record persistence.
//!
//! The listing database is an external collaborator; the pipeline only needs
//! insert, explicit metadata updates, lookup and delete.

use agentdesk_core::{RecordUpdate, UploadRecord};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum RecordStoreError {
    #[error("Record not found: {0}")]
    NotFound(Uuid),

    #[error("Record already exists: {0}")]
    Duplicate(Uuid),

    #[error("Record store error: {0}")]
    Backend(String),
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Persist a new record and return it as stored.
    async fn insert(&self, record: UploadRecord) -> Result<UploadRecord, RecordStoreError>;

    /// Apply an explicit metadata change. Marking a record primary clears the
    /// flag on every other record of the same listing.
    async fn update(
        &self,
        id: Uuid,
        update: &RecordUpdate,
    ) -> Result<UploadRecord, RecordStoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<UploadRecord>, RecordStoreError>;

    async fn delete(&self, id: Uuid) -> Result<(), RecordStoreError>;

    /// Records of a listing ordered by `sort_order`, then creation time.
    async fn list_for_listing(
        &self,
        listing_id: &str,
    ) -> Result<Vec<UploadRecord>, RecordStoreError>;
}

/// Record store held in process memory.
#[derive(Clone, Default)]
pub struct InMemoryRecordStore {
    records: Arc<Mutex<HashMap<Uuid, UploadRecord>>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<Uuid, UploadRecord>>, RecordStoreError> {
        self.records
            .lock()
            .map_err(|_| RecordStoreError::Backend("record store lock poisoned".to_string()))
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn insert(&self, record: UploadRecord) -> Result<UploadRecord, RecordStoreError> {
        let mut records = self.lock()?;
        if records.contains_key(&record.id) {
            return Err(RecordStoreError::Duplicate(record.id));
        }
        records.insert(record.id, record.clone());
        Ok(record)
    }

    async fn update(
        &self,
        id: Uuid,
        update: &RecordUpdate,
    ) -> Result<UploadRecord, RecordStoreError> {
        let mut records = self.lock()?;

        let listing_id = {
            let record = records.get_mut(&id).ok_or(RecordStoreError::NotFound(id))?;
            record.apply(update);
            record.listing_id.clone()
        };

        if update.is_primary == Some(true) {
            for other in records.values_mut() {
                if other.id != id && other.listing_id == listing_id {
                    other.is_primary = false;
                }
            }
        }

        records
            .get(&id)
            .cloned()
            .ok_or(RecordStoreError::NotFound(id))
    }

    async fn get(&self, id: Uuid) -> Result<Option<UploadRecord>, RecordStoreError> {
        Ok(self.lock()?.get(&id).cloned())
    }

    async fn delete(&self, id: Uuid) -> Result<(), RecordStoreError> {
        self.lock()?
            .remove(&id)
            .map(|_| ())
            .ok_or(RecordStoreError::NotFound(id))
    }

    async fn list_for_listing(
        &self,
        listing_id: &str,
    ) -> Result<Vec<UploadRecord>, RecordStoreError> {
        let mut records: Vec<UploadRecord> = self
            .lock()?
            .values()
            .filter(|r| r.listing_id.as_deref() == Some(listing_id))
            .cloned()
            .collect();
        records.sort_by(|a, b| {
            a.sort_order
                .cmp(&b.sort_order)
                .then(a.created_at.cmp(&b.created_at))
        });
        Ok(records)
    }
}
