//! Cache invalidation layer shared by the workers and the API.
//!
//! Keys follow a colon-delimited namespace convention
//! (`article:id:<id>`, `article:query:<hash>`) so that both exact-key and
//! glob-pattern invalidation are possible. The [`Cache`] trait is
//! object-safe; typed read/write helpers live in [`json`].

pub mod error;
pub mod json;
pub mod keys;
pub mod memory;
pub mod redis_cache;

pub use error::{CacheError, CacheResult};
pub use json::{get_json, set_json, wrap};
pub use memory::MemoryCache;
pub use redis_cache::RedisCache;

use std::time::Duration;

use async_trait::async_trait;

/// Exact-key and pattern operations on the cache store.
///
/// Deleting a missing key, or a pattern that matches nothing, is a no-op
/// and never an error.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Get the serialized value for a key.
    async fn get(&self, key: &str) -> CacheResult<Option<String>>;

    /// Store a serialized value, with an optional TTL.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> CacheResult<()>;

    /// Delete one key.
    async fn del(&self, key: &str) -> CacheResult<()>;

    /// Delete every key matching a glob (`*` wildcard). Returns the number
    /// of keys removed.
    async fn del_pattern(&self, pattern: &str) -> CacheResult<u64>;

    /// Flush the whole cache. Test harnesses only; production workers
    /// invalidate by key or pattern.
    async fn clear(&self) -> CacheResult<()>;
}
