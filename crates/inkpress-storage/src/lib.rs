//! Object storage for generated assets.
//!
//! This crate provides:
//! - An S3-compatible client for Cloudflare R2 (the production bucket)
//! - The [`ObjectStorage`] trait seam so workers can run against fakes
//! - Partial-failure-tolerant batch upload of externally-sourced assets

pub mod client;
pub mod error;
pub mod memory;
pub mod sources;

pub use client::{R2Client, R2Config};
pub use error::{StorageError, StorageResult};
pub use memory::MemoryStorage;
pub use sources::{SourceUploader, UploadFailure, UploadReport, UploadedObject};

use async_trait::async_trait;

/// Object storage operations used by the workers.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Upload a byte buffer under the given key.
    async fn upload_bytes(
        &self,
        data: Vec<u8>,
        key: &str,
        content_type: &str,
    ) -> StorageResult<()>;

    /// Delete objects by key. Missing keys are not an error.
    async fn delete_objects(&self, keys: &[String]) -> StorageResult<u32>;

    /// Public URL for a stored object.
    fn url(&self, key: &str) -> String;
}
