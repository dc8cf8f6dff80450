//! Typed helpers over the object-safe [`Cache`] trait.

use std::future::Future;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::error::CacheResult;
use crate::Cache;

/// Get and deserialize a cached value. A value that no longer parses is
/// treated as a miss.
pub async fn get_json<T: DeserializeOwned>(
    cache: &dyn Cache,
    key: &str,
) -> CacheResult<Option<T>> {
    match cache.get(key).await? {
        Some(raw) => match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                debug!(key = %key, error = %e, "Cache entry no longer parses, treating as miss");
                Ok(None)
            }
        },
        None => Ok(None),
    }
}

/// Serialize and store a value.
pub async fn set_json<T: Serialize>(
    cache: &dyn Cache,
    key: &str,
    value: &T,
    ttl: Option<Duration>,
) -> CacheResult<()> {
    let raw = serde_json::to_string(value)?;
    cache.set(key, &raw, ttl).await
}

/// Read-through helper: return the cached value if present, else compute,
/// store, and return. For read-heavy, rarely-changing reference data.
pub async fn wrap<T, F, Fut, E>(
    cache: &dyn Cache,
    key: &str,
    ttl: Option<Duration>,
    compute: F,
) -> Result<T, E>
where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    // Cache trouble must never fail the read path; fall through to compute.
    if let Ok(Some(hit)) = get_json::<T>(cache, key).await {
        debug!(key = %key, "Cache hit");
        return Ok(hit);
    }

    let value = compute().await?;
    if let Err(e) = set_json(cache, key, &value, ttl).await {
        debug!(key = %key, error = %e, "Failed to populate cache");
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryCache;

    #[tokio::test]
    async fn wrap_computes_once_then_hits() {
        let cache = MemoryCache::new();
        let mut calls = 0u32;

        let first: Result<u32, std::convert::Infallible> =
            wrap(&cache, "ref:answer", None, || {
                calls += 1;
                async { Ok(42) }
            })
            .await;
        assert_eq!(first.unwrap(), 42);

        let second: Result<u32, std::convert::Infallible> =
            wrap(&cache, "ref:answer", None, || {
                calls += 1;
                async { Ok(0) }
            })
            .await;
        assert_eq!(second.unwrap(), 42);
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn wrap_propagates_compute_errors() {
        let cache = MemoryCache::new();

        let result: Result<u32, &str> =
            wrap(&cache, "ref:bad", None, || async { Err("boom") }).await;
        assert_eq!(result.unwrap_err(), "boom");

        // Nothing was stored for the failed computation.
        assert!(cache.get("ref:bad").await.unwrap().is_none());
    }
}
