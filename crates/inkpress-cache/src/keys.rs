//! Cache key helpers.
//!
//! All article-derived cache entries share these formats so that workers
//! and the API layer invalidate the same families of keys.

use sha2::{Digest, Sha256};

use inkpress_models::ArticleId;

/// Exact key for an article fetched by ID.
pub fn article_id_key(id: &ArticleId) -> String {
    format!("article:id:{}", id)
}

/// Exact key for an article fetched by slug.
pub fn article_slug_key(slug: &str) -> String {
    format!("article:slug:{}", slug)
}

/// Key for a cached listing/query result. The hash makes arbitrary query
/// strings safe as key material.
pub fn article_query_key(canonical_query: &str) -> String {
    let digest = Sha256::digest(canonical_query.trim().as_bytes());
    format!("article:query:{:x}", digest)
}

/// Glob matching every cached listing/query result.
pub fn article_query_pattern() -> &'static str {
    "article:query:*"
}
