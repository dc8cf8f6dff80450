//! In-memory cache, used by tests and as a collaborator fake.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use regex::Regex;
use tokio::sync::RwLock;

use crate::error::{CacheError, CacheResult};
use crate::Cache;

struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() >= at)
    }
}

/// In-memory [`Cache`] implementation with the same TTL and glob
/// semantics as the Redis client.
#[derive(Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, Entry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (unexpired) entries.
    pub async fn len(&self) -> usize {
        let entries = self.entries.read().await;
        entries.values().filter(|e| !e.is_expired()).count()
    }
}

/// Translate a glob (`*` wildcard) into an anchored regex.
fn glob_to_regex(pattern: &str) -> CacheResult<Regex> {
    let mut regex = String::with_capacity(pattern.len() + 2);
    regex.push('^');
    for ch in pattern.chars() {
        match ch {
            '*' => regex.push_str(".*"),
            other => regex.push_str(&regex::escape(&other.to_string())),
        }
    }
    regex.push('$');

    Regex::new(&regex).map_err(|e| CacheError::invalid_pattern(e.to_string()))
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .filter(|e| !e.is_expired())
            .map(|e| e.value.clone()))
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> CacheResult<()> {
        let mut entries = self.entries.write().await;
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: ttl.map(|ttl| Instant::now() + ttl),
            },
        );
        Ok(())
    }

    async fn del(&self, key: &str) -> CacheResult<()> {
        let mut entries = self.entries.write().await;
        entries.remove(key);
        Ok(())
    }

    async fn del_pattern(&self, pattern: &str) -> CacheResult<u64> {
        let matcher = glob_to_regex(pattern)?;
        let mut entries = self.entries.write().await;

        let before = entries.len();
        entries.retain(|key, _| !matcher.is_match(key));
        Ok((before - entries.len()) as u64)
    }

    async fn clear(&self) -> CacheResult<()> {
        let mut entries = self.entries.write().await;
        entries.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys;
    use inkpress_models::ArticleId;

    #[tokio::test]
    async fn del_of_missing_key_is_noop() {
        let cache = MemoryCache::new();
        cache.del("article:id:missing").await.expect("no error");
    }

    #[tokio::test]
    async fn del_pattern_removes_prefix_family_only() {
        let cache = MemoryCache::new();
        let id = ArticleId::from_string("123");

        cache
            .set(&keys::article_id_key(&id), "{}", None)
            .await
            .unwrap();
        cache
            .set(&keys::article_query_key("page=1"), "[]", None)
            .await
            .unwrap();
        cache
            .set(&keys::article_query_key("author=9"), "[]", None)
            .await
            .unwrap();

        let removed = cache
            .del_pattern(keys::article_query_pattern())
            .await
            .unwrap();
        assert_eq!(removed, 2);

        // Keys outside the prefix are untouched.
        assert!(cache
            .get(&keys::article_id_key(&id))
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn del_pattern_zero_matches_is_noop() {
        let cache = MemoryCache::new();
        cache.set("article:id:1", "{}", None).await.unwrap();

        let removed = cache.del_pattern("user:query:*").await.unwrap();
        assert_eq!(removed, 0);
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn glob_is_anchored_and_literal_outside_wildcards() {
        let cache = MemoryCache::new();
        cache.set("article:id:10", "{}", None).await.unwrap();
        cache.set("article:id:100", "{}", None).await.unwrap();
        // Dots in keys must match literally, not as regex wildcards.
        cache.set("articleXid:10", "{}", None).await.unwrap();

        let removed = cache.del_pattern("article.id:*").await.unwrap();
        assert_eq!(removed, 0);

        let removed = cache.del_pattern("article:id:10").await.unwrap();
        assert_eq!(removed, 1);
        assert!(cache.get("article:id:100").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn ttl_expiry_is_a_miss() {
        let cache = MemoryCache::new();
        cache
            .set("article:id:ttl", "{}", Some(Duration::from_millis(10)))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(cache.get("article:id:ttl").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn clear_flushes_everything() {
        let cache = MemoryCache::new();
        cache.set("a", "1", None).await.unwrap();
        cache.set("b", "2", None).await.unwrap();

        cache.clear().await.unwrap();
        assert_eq!(cache.len().await, 0);
    }
}
