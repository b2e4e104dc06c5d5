//! Object storage collaborator contract.
//!
//! Durable byte storage is external; the pipeline only depends on this
//! trait. Transient failures are retried by the gateway through the
//! shared retry policy.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Store `bytes` under `key`, returning an opaque storage reference
    async fn put(&self, bytes: &[u8], key: &str) -> Result<String, StorageError>;

    /// Fetch the bytes behind a storage reference
    async fn get(&self, storage_ref: &str) -> Result<Vec<u8>, StorageError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Storage operation failed: {0}")]
    OperationFailed(String),

    #[error("Object not found: {0}")]
    NotFound(String),
}

/// In-memory object storage used by tests and the default wiring
#[derive(Default)]
pub struct InMemoryObjectStorage {
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl InMemoryObjectStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn object_count(&self) -> usize {
        self.objects.lock().unwrap().len()
    }
}

#[async_trait]
impl ObjectStorage for InMemoryObjectStorage {
    async fn put(&self, bytes: &[u8], key: &str) -> Result<String, StorageError> {
        let storage_ref = format!("mem://{}", key);
        self.objects
            .lock()
            .unwrap()
            .insert(storage_ref.clone(), bytes.to_vec());
        Ok(storage_ref)
    }

    async fn get(&self, storage_ref: &str) -> Result<Vec<u8>, StorageError> {
        self.objects
            .lock()
            .unwrap()
            .get(storage_ref)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(storage_ref.to_string()))
    }
}

/// Storage stub that fails a configured number of puts before
/// succeeding; used to exercise the gateway's retry path.
pub struct FlakyObjectStorage {
    inner: InMemoryObjectStorage,
    failures_remaining: Mutex<u32>,
}

impl FlakyObjectStorage {
    pub fn failing(times: u32) -> Self {
        Self {
            inner: InMemoryObjectStorage::new(),
            failures_remaining: Mutex::new(times),
        }
    }
}

#[async_trait]
impl ObjectStorage for FlakyObjectStorage {
    async fn put(&self, bytes: &[u8], key: &str) -> Result<String, StorageError> {
        {
            let mut remaining = self.failures_remaining.lock().unwrap();
            if *remaining > 0 {
                *remaining -= 1;
                return Err(StorageError::OperationFailed(
                    "simulated transient failure".to_string(),
                ));
            }
        }
        self.inner.put(bytes, key).await
    }

    async fn get(&self, storage_ref: &str) -> Result<Vec<u8>, StorageError> {
        self.inner.get(storage_ref).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_then_get_roundtrip() {
        let storage = InMemoryObjectStorage::new();
        let storage_ref = storage.put(b"hello", "docs/a.txt").await.unwrap();
        assert_eq!(storage.get(&storage_ref).await.unwrap(), b"hello");
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let storage = InMemoryObjectStorage::new();
        assert!(matches!(
            storage.get("mem://missing").await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_flaky_storage_recovers() {
        let storage = FlakyObjectStorage::failing(2);
        assert!(storage.put(b"x", "k").await.is_err());
        assert!(storage.put(b"x", "k").await.is_err());
        assert!(storage.put(b"x", "k").await.is_ok());
    }
}
