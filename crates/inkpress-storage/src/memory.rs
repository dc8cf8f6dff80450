//! In-memory object storage, used by tests and as a collaborator fake.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::StorageResult;
use crate::ObjectStorage;

/// A stored object with its content type.
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub data: Vec<u8>,
    pub content_type: String,
}

/// In-memory [`ObjectStorage`] implementation.
#[derive(Default)]
pub struct MemoryStorage {
    objects: Mutex<HashMap<String, StoredObject>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch a stored object (tests only).
    pub async fn object(&self, key: &str) -> Option<StoredObject> {
        let objects = self.objects.lock().await;
        objects.get(key).cloned()
    }

    /// Number of stored objects.
    pub async fn len(&self) -> usize {
        let objects = self.objects.lock().await;
        objects.len()
    }

    /// All stored keys, sorted.
    pub async fn keys(&self) -> Vec<String> {
        let objects = self.objects.lock().await;
        let mut keys: Vec<_> = objects.keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl ObjectStorage for MemoryStorage {
    async fn upload_bytes(
        &self,
        data: Vec<u8>,
        key: &str,
        content_type: &str,
    ) -> StorageResult<()> {
        let mut objects = self.objects.lock().await;
        objects.insert(
            key.to_string(),
            StoredObject {
                data,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    async fn delete_objects(&self, keys: &[String]) -> StorageResult<u32> {
        let mut objects = self.objects.lock().await;
        let mut removed = 0;
        for key in keys {
            if objects.remove(key).is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }

    fn url(&self, key: &str) -> String {
        format!("memory://{}", key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn upload_then_delete() {
        let storage = MemoryStorage::new();
        storage
            .upload_bytes(vec![1, 2, 3], "a/b.bin", "application/octet-stream")
            .await
            .unwrap();
        assert_eq!(storage.len().await, 1);

        let removed = storage
            .delete_objects(&["a/b.bin".to_string(), "missing".to_string()])
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert_eq!(storage.len().await, 0);
    }
}
