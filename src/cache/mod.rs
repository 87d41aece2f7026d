//! Response cache abstraction with Redis and in-memory backends
//!
//! Provider search responses (and other short-lived JSON payloads) are
//! cached behind the [`ResponseCache`] trait. At startup the factory tries
//! Redis when a URL is configured and falls back to the in-process backend
//! on any failure; the selection is fixed for the process lifetime.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, warn};
use utoipa::ToSchema;

pub mod memory;
pub mod redis;

pub use self::memory::MemoryCacheBackend;
pub use self::redis::RedisCacheBackend;

/// Cache statistics exposed read-only via the API
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CacheStats {
    pub backend: String,
    pub hits: u64,
    pub misses: u64,
    /// Approximate entry count
    pub size: u64,
}

/// Key/value store with per-entry TTL and prefix invalidation.
///
/// Values are opaque strings (JSON in practice). `ttl_seconds = 0` means no
/// expiry. `clear` returns the number of deleted keys and only promises to
/// remove keys that matched at some point during its scan.
#[async_trait]
pub trait ResponseCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<()>;

    /// Returns true when the key existed
    async fn delete(&self, key: &str) -> Result<bool>;

    async fn exists(&self, key: &str) -> Result<bool>;

    /// Delete keys starting with `prefix`; empty prefix clears everything
    async fn clear(&self, prefix: &str) -> Result<u64>;

    async fn stats(&self) -> CacheStats;
}

/// Create the cache backend for this process.
///
/// An empty `redis_url` selects the in-process backend directly. Otherwise
/// Redis is attempted (connect + PING) and any failure falls back to the
/// in-process backend with a logged warning.
pub async fn create_cache_backend(redis_url: &str) -> Arc<dyn ResponseCache> {
    if redis_url.is_empty() {
        info!("Using in-process response cache");
        return Arc::new(MemoryCacheBackend::new());
    }

    match RedisCacheBackend::connect(redis_url).await {
        Ok(backend) => {
            info!("Redis response cache connected: {}", redis_url);
            Arc::new(backend)
        }
        Err(e) => {
            warn!("Redis unavailable ({e}), using in-process response cache");
            Arc::new(MemoryCacheBackend::new())
        }
    }
}
