use crate::keys::validate_path;
use crate::traits::{BlobStore, StorageResult, StoredObject};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
struct StoredBlob {
    content_type: String,
    data: Bytes,
}

/// In-memory blob store for dry runs and tests.
#[derive(Clone)]
pub struct InMemoryBlobStore {
    objects: Arc<Mutex<HashMap<(String, String), StoredBlob>>>,
    base_url: String,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self {
            objects: Arc::new(Mutex::new(HashMap::new())),
            base_url: "memory://".to_string(),
        }
    }

    pub fn contains(&self, bucket: &str, path: &str) -> bool {
        self.objects
            .lock()
            .map(|objects| objects.contains_key(&(bucket.to_string(), path.to_string())))
            .unwrap_or(false)
    }

    pub fn get(&self, bucket: &str, path: &str) -> Option<Bytes> {
        self.objects.lock().ok().and_then(|objects| {
            objects
                .get(&(bucket.to_string(), path.to_string()))
                .map(|blob| blob.data.clone())
        })
    }

    pub fn content_type(&self, bucket: &str, path: &str) -> Option<String> {
        self.objects.lock().ok().and_then(|objects| {
            objects
                .get(&(bucket.to_string(), path.to_string()))
                .map(|blob| blob.content_type.clone())
        })
    }

    /// Sorted paths stored in a bucket.
    pub fn paths(&self, bucket: &str) -> Vec<String> {
        let mut paths: Vec<String> = self
            .objects
            .lock()
            .map(|objects| {
                objects
                    .keys()
                    .filter(|(b, _)| b == bucket)
                    .map(|(_, p)| p.clone())
                    .collect()
            })
            .unwrap_or_default();
        paths.sort();
        paths
    }

    pub fn len(&self) -> usize {
        self.objects.lock().map(|objects| objects.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn put(
        &self,
        bucket: &str,
        path: &str,
        content_type: &str,
        data: Bytes,
    ) -> StorageResult<StoredObject> {
        validate_path(bucket)?;
        validate_path(path)?;
        let size = data.len() as u64;

        if let Ok(mut objects) = self.objects.lock() {
            objects.insert(
                (bucket.to_string(), path.to_string()),
                StoredBlob {
                    content_type: content_type.to_string(),
                    data,
                },
            );
        }

        tracing::debug!(bucket = %bucket, key = %path, size_bytes = size, "In-memory write");

        Ok(StoredObject {
            path: path.to_string(),
            public_url: self.public_url(bucket, path),
            size_bytes: size,
        })
    }

    async fn remove(&self, bucket: &str, paths: &[String]) -> StorageResult<()> {
        if let Ok(mut objects) = self.objects.lock() {
            for path in paths {
                objects.remove(&(bucket.to_string(), path.clone()));
            }
        }
        Ok(())
    }

    async fn exists(&self, bucket: &str, path: &str) -> StorageResult<bool> {
        Ok(self.contains(bucket, path))
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("{}{}/{}", self.base_url, bucket, path)
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Memory
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_put_get_remove() {
        let store = InMemoryBlobStore::new();
        assert!(store.is_empty());

        let stored = store
            .put("b", "l/a.webp", "image/webp", Bytes::from_static(b"abc"))
            .await
            .unwrap();
        assert_eq!(stored.public_url, "memory://b/l/a.webp");
        assert_eq!(store.get("b", "l/a.webp").unwrap(), Bytes::from_static(b"abc"));
        assert_eq!(store.content_type("b", "l/a.webp").as_deref(), Some("image/webp"));
        assert_eq!(store.paths("b"), vec!["l/a.webp".to_string()]);
        assert!(store.paths("other").is_empty());

        store
            .remove("b", &["l/a.webp".to_string(), "l/none".to_string()])
            .await
            .unwrap();
        assert!(!store.contains("b", "l/a.webp"));
        assert_eq!(store.len(), 0);
    }

    #[tokio::test]
    async fn test_memory_clones_share_state() {
        let store = InMemoryBlobStore::new();
        let clone = store.clone();
        clone
            .put("b", "x.png", "image/png", Bytes::from_static(b"1"))
            .await
            .unwrap();
        assert!(store.exists("b", "x.png").await.unwrap());
    }

    #[tokio::test]
    async fn test_memory_rejects_invalid_paths() {
        let store = InMemoryBlobStore::new();
        assert!(store
            .put("b", "../x.png", "image/png", Bytes::new())
            .await
            .is_err());
    }
}
