use crate::optimizer::OptimizationResult;
use crate::validator::ValidationResult;
use agentdesk_core::{SourceFile, UploadRecord};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Mutex;

/// Entry counts per memoized operation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub validation_count: usize,
    pub optimization_count: usize,
    pub upload_count: usize,
}

/// Per-pipeline memoization of stage results.
///
/// Keys combine the operation, the file fingerprint and a digest of the
/// options. Inserts keep the first stored value, so concurrent writers for the
/// same key all observe one result.
#[derive(Default)]
pub struct ProcessingCache {
    validation: Mutex<HashMap<String, ValidationResult>>,
    optimization: Mutex<HashMap<String, OptimizationResult>>,
    upload: Mutex<HashMap<String, UploadRecord>>,
}

fn lookup<V: Clone>(map: &Mutex<HashMap<String, V>>, key: &str) -> Option<V> {
    map.lock()
        .unwrap_or_else(|e| e.into_inner())
        .get(key)
        .cloned()
}

fn keep_first<V: Clone>(map: &Mutex<HashMap<String, V>>, key: String, value: V) -> V {
    map.lock()
        .unwrap_or_else(|e| e.into_inner())
        .entry(key)
        .or_insert(value)
        .clone()
}

fn count<V>(map: &Mutex<HashMap<String, V>>) -> usize {
    map.lock().unwrap_or_else(|e| e.into_inner()).len()
}

impl ProcessingCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// `{operation}:{fingerprint}:{sha256(options)}`
    pub fn key<T: Serialize + ?Sized>(operation: &str, file: &SourceFile, options: &T) -> String {
        let encoded = serde_json::to_vec(options).unwrap_or_default();
        let digest = Sha256::digest(&encoded);
        format!("{}:{}:{}", operation, file.fingerprint(), hex::encode(digest))
    }

    pub fn validation(&self, key: &str) -> Option<ValidationResult> {
        lookup(&self.validation, key)
    }

    pub fn store_validation(&self, key: String, value: ValidationResult) -> ValidationResult {
        keep_first(&self.validation, key, value)
    }

    pub fn optimization(&self, key: &str) -> Option<OptimizationResult> {
        lookup(&self.optimization, key)
    }

    pub fn store_optimization(&self, key: String, value: OptimizationResult) -> OptimizationResult {
        keep_first(&self.optimization, key, value)
    }

    pub fn upload(&self, key: &str) -> Option<UploadRecord> {
        lookup(&self.upload, key)
    }

    pub fn store_upload(&self, key: String, value: UploadRecord) -> UploadRecord {
        keep_first(&self.upload, key, value)
    }

    pub fn clear(&self) {
        self.validation.lock().unwrap_or_else(|e| e.into_inner()).clear();
        self.optimization.lock().unwrap_or_else(|e| e.into_inner()).clear();
        self.upload.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            validation_count: count(&self.validation),
            optimization_count: count(&self.optimization),
            upload_count: count(&self.upload),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentdesk_core::{OptimizationOptions, ValidationOptions};
    use chrono::{TimeZone, Utc};

    fn file(name: &str, data: &'static [u8]) -> SourceFile {
        SourceFile::new(
            name,
            "image/jpeg",
            data,
            Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap(),
        )
    }

    fn validation(admitted: bool) -> ValidationResult {
        ValidationResult {
            admitted,
            errors: Vec::new(),
            warnings: Vec::new(),
            metadata: None,
            suggestions: Vec::new(),
        }
    }

    #[test]
    fn test_key_depends_on_operation_file_and_options() {
        let a = file("a.jpg", b"abc");
        let base = ProcessingCache::key("validate", &a, &ValidationOptions::default());
        assert_eq!(base, ProcessingCache::key("validate", &a, &ValidationOptions::default()));
        assert!(base.starts_with("validate:a.jpg:3:"));

        let stricter = ValidationOptions {
            max_file_size: 1,
            ..Default::default()
        };
        assert_ne!(base, ProcessingCache::key("validate", &a, &stricter));
        assert_ne!(base, ProcessingCache::key("optimize", &a, &ValidationOptions::default()));
        assert_ne!(
            ProcessingCache::key("optimize", &a, &OptimizationOptions::default()),
            ProcessingCache::key("optimize", &file("b.jpg", b"abc"), &OptimizationOptions::default())
        );
    }

    #[test]
    fn test_first_insert_wins() {
        let cache = ProcessingCache::new();
        let stored = cache.store_validation("k".to_string(), validation(true));
        assert!(stored.admitted);
        let second = cache.store_validation("k".to_string(), validation(false));
        assert!(second.admitted);
        assert!(cache.validation("k").unwrap().admitted);
    }

    #[test]
    fn test_stats_and_clear() {
        let cache = ProcessingCache::new();
        cache.store_validation("a".to_string(), validation(true));
        cache.store_validation("b".to_string(), validation(false));
        assert_eq!(
            cache.stats(),
            CacheStats {
                validation_count: 2,
                optimization_count: 0,
                upload_count: 0
            }
        );
        cache.clear();
        assert_eq!(cache.stats(), CacheStats::default());
        assert!(cache.validation("a").is_none());
    }
}
