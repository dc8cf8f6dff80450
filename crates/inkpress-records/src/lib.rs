//! Record store client for article records.
//!
//! The record store itself (schema, queries) lives in another service;
//! this crate carries only the interface the pipeline needs
//! (create/find/update/delete on [`Article`]) plus the production REST
//! client and an in-memory implementation for tests.

pub mod error;
pub mod memory;
pub mod rest;


pub use error::{RecordStoreError, RecordStoreResult};
pub use memory::MemoryRecordStore;
pub use rest::{RestRecordStore, RestRecordStoreConfig};

use async_trait::async_trait;

use inkpress_models::{Article, ArticleId};

/// Operations on the article record store.
///
/// Every mutation is a single idempotent-on-retry write: workers
/// read-modify-write whole records and never hold a lock across a call.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Create a record. Used by the API layer for placeholders and by
    /// test setups.
    async fn create(&self, article: &Article) -> RecordStoreResult<()>;

    /// Fetch a record by ID; `None` when absent.
    async fn find_by_id(&self, id: &ArticleId) -> RecordStoreResult<Option<Article>>;

    /// Replace a record with the given state.
    async fn update(&self, article: &Article) -> RecordStoreResult<()>;

    /// Delete a record. Deleting an absent record is a no-op so that
    /// compensating deletes stay idempotent under retry.
    async fn delete(&self, id: &ArticleId) -> RecordStoreResult<()>;
}
