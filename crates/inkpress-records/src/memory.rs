//! In-memory record store, used by tests and as a collaborator fake.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use inkpress_models::{Article, ArticleId};

use crate::error::{RecordStoreError, RecordStoreResult};
use crate::RecordStore;

/// In-memory [`RecordStore`] implementation.
#[derive(Default)]
pub struct MemoryRecordStore {
    records: Mutex<HashMap<ArticleId, Article>>,
    fail_deletes: std::sync::atomic::AtomicBool,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub async fn len(&self) -> usize {
        let records = self.records.lock().await;
        records.len()
    }

    /// Make every subsequent `delete` fail, to exercise the compensation
    /// fallback path in worker tests.
    pub fn fail_deletes(&self) {
        self.fail_deletes
            .store(true, std::sync::atomic::Ordering::SeqCst);
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn create(&self, article: &Article) -> RecordStoreResult<()> {
        let mut records = self.records.lock().await;
        records.insert(article.id.clone(), article.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &ArticleId) -> RecordStoreResult<Option<Article>> {
        let records = self.records.lock().await;
        Ok(records.get(id).cloned())
    }

    async fn update(&self, article: &Article) -> RecordStoreResult<()> {
        let mut records = self.records.lock().await;
        if !records.contains_key(&article.id) {
            return Err(RecordStoreError::not_found(article.id.to_string()));
        }
        records.insert(article.id.clone(), article.clone());
        Ok(())
    }

    async fn delete(&self, id: &ArticleId) -> RecordStoreResult<()> {
        if self.fail_deletes.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(RecordStoreError::api(503, "simulated delete outage"));
        }

        let mut records = self.records.lock().await;
        records.remove(id);
        Ok(())
    }
}
