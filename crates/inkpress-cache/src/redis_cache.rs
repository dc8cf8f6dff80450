//! Redis-backed cache.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use tracing::{debug, warn};

use crate::error::{CacheError, CacheResult};
use crate::Cache;

/// Cache configuration.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Redis URL
    pub redis_url: String,
    /// SCAN batch size for pattern deletes
    pub scan_count: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379".to_string(),
            scan_count: 100,
        }
    }
}

impl CacheConfig {
    /// Create config from environment variables. The cache shares the
    /// broker's Redis unless `CACHE_REDIS_URL` points elsewhere.
    pub fn from_env() -> Self {
        let redis_url = std::env::var("CACHE_REDIS_URL")
            .or_else(|_| std::env::var("REDIS_URL"))
            .unwrap_or_else(|_| "redis://localhost:6379".to_string());

        Self {
            redis_url,
            scan_count: std::env::var("CACHE_SCAN_COUNT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(100),
        }
    }
}

/// Redis cache client.
#[derive(Clone)]
pub struct RedisCache {
    client: redis::Client,
    scan_count: usize,
}

impl RedisCache {
    /// Create a new cache client.
    pub fn new(config: CacheConfig) -> CacheResult<Self> {
        let client = redis::Client::open(config.redis_url.as_str())?;
        Ok(Self {
            client,
            scan_count: config.scan_count,
        })
    }

    /// Create from environment variables.
    pub fn from_env() -> CacheResult<Self> {
        Self::new(CacheConfig::from_env())
    }

    async fn conn(&self) -> CacheResult<MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(CacheError::Redis)
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let mut conn = self.conn().await?;
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> CacheResult<()> {
        let mut conn = self.conn().await?;
        match ttl {
            Some(ttl) => {
                conn.set_ex::<_, _, ()>(key, value, ttl.as_secs().max(1))
                    .await?
            }
            None => conn.set::<_, _, ()>(key, value).await?,
        }
        Ok(())
    }

    async fn del(&self, key: &str) -> CacheResult<()> {
        let mut conn = self.conn().await?;
        // DEL of a missing key returns 0; that is a no-op, not an error.
        let _: u64 = conn.del(key).await?;
        Ok(())
    }

    async fn del_pattern(&self, pattern: &str) -> CacheResult<u64> {
        let mut conn = self.conn().await?;

        // SCAN MATCH takes the glob natively; an anchored regex is only
        // needed by the in-memory implementation.
        let mut cursor: u64 = 0;
        let mut deleted: u64 = 0;

        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(self.scan_count)
                .query_async(&mut conn)
                .await?;

            if !keys.is_empty() {
                let removed: u64 = conn.del(&keys).await?;
                deleted += removed;
            }

            cursor = next;
            if cursor == 0 {
                break;
            }
        }

        if deleted > 0 {
            debug!("Invalidated {} keys matching {}", deleted, pattern);
        }
        Ok(deleted)
    }

    async fn clear(&self) -> CacheResult<()> {
        warn!("Flushing entire cache database");
        let mut conn = self.conn().await?;
        redis::cmd("FLUSHDB").query_async::<()>(&mut conn).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys;
    use inkpress_models::ArticleId;

    /// Scenario: pattern invalidation removes the query family and leaves
    /// exact-id keys untouched. Requires a live Redis.
    #[tokio::test]
    #[ignore = "requires Redis"]
    async fn del_pattern_scopes_to_prefix() {
        dotenvy::dotenv().ok();
        let cache = RedisCache::from_env().expect("cache client");

        let id = ArticleId::from_string("it-123");
        let id_key = keys::article_id_key(&id);
        cache.set(&id_key, "{}", None).await.unwrap();
        cache
            .set(&keys::article_query_key("page=1"), "[]", None)
            .await
            .unwrap();
        cache
            .set(&keys::article_query_key("page=2"), "[]", None)
            .await
            .unwrap();

        let removed = cache
            .del_pattern(keys::article_query_pattern())
            .await
            .unwrap();
        assert!(removed >= 2);
        assert!(cache.get(&id_key).await.unwrap().is_some());

        cache.del(&id_key).await.unwrap();
    }

    /// Deleting a pattern with zero matches is a no-op.
    #[tokio::test]
    #[ignore = "requires Redis"]
    async fn del_pattern_zero_matches_is_noop() {
        dotenvy::dotenv().ok();
        let cache = RedisCache::from_env().expect("cache client");

        let removed = cache.del_pattern("article:query:never-*").await.unwrap();
        assert_eq!(removed, 0);
    }
}
