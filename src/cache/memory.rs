//! In-process response cache backend
//!
//! Fallback used when Redis is not configured or unreachable. Entries carry
//! their own expiry instant; expired entries are invisible to readers and
//! swept opportunistically every N-th access.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use anyhow::Result;
use async_trait::async_trait;
use tracing::debug;

use super::{CacheStats, ResponseCache};

/// Sweep expired entries every this many accesses
const EVICTION_INTERVAL: u64 = 100;

#[derive(Debug)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.map(|at| now > at).unwrap_or(false)
    }
}

/// Thread-safe in-process cache with TTL eviction
#[derive(Debug, Default)]
pub struct MemoryCacheBackend {
    store: Mutex<HashMap<String, Entry>>,
    hits: AtomicU64,
    misses: AtomicU64,
    access_count: AtomicU64,
}

impl MemoryCacheBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn maybe_evict(&self) {
        let accesses = self.access_count.fetch_add(1, Ordering::Relaxed) + 1;
        if accesses % EVICTION_INTERVAL != 0 {
            return;
        }

        let now = Instant::now();
        let mut store = self.store.lock().expect("cache lock poisoned");
        let before = store.len();
        store.retain(|_, entry| !entry.is_expired(now));
        let evicted = before - store.len();
        if evicted > 0 {
            debug!("Evicted {evicted} expired cache entries");
        }
    }
}

#[async_trait]
impl ResponseCache for MemoryCacheBackend {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.maybe_evict();
        let now = Instant::now();
        let mut store = self.store.lock().expect("cache lock poisoned");
        match store.get(key) {
            Some(entry) if entry.is_expired(now) => {
                store.remove(key);
                self.misses.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
            Some(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Ok(Some(entry.value.clone()))
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
        }
    }

    async fn set(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<()> {
        self.maybe_evict();
        let expires_at = if ttl_seconds > 0 {
            Some(Instant::now() + Duration::from_secs(ttl_seconds))
        } else {
            None
        };
        let mut store = self.store.lock().expect("cache lock poisoned");
        store.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let mut store = self.store.lock().expect("cache lock poisoned");
        Ok(store.remove(key).is_some())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let now = Instant::now();
        let mut store = self.store.lock().expect("cache lock poisoned");
        match store.get(key) {
            Some(entry) if entry.is_expired(now) => {
                store.remove(key);
                Ok(false)
            }
            Some(_) => Ok(true),
            None => Ok(false),
        }
    }

    async fn clear(&self, prefix: &str) -> Result<u64> {
        let mut store = self.store.lock().expect("cache lock poisoned");
        if prefix.is_empty() {
            let count = store.len() as u64;
            store.clear();
            return Ok(count);
        }
        let before = store.len();
        store.retain(|key, _| !key.starts_with(prefix));
        Ok((before - store.len()) as u64)
    }

    async fn stats(&self) -> CacheStats {
        let size = self.store.lock().expect("cache lock poisoned").len() as u64;
        CacheStats {
            backend: "memory".to_string(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_then_get_roundtrip() {
        let cache = MemoryCacheBackend::new();
        cache.set("k", "v", 0).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("v"));
        assert!(cache.exists("k").await.unwrap());
    }

    #[tokio::test]
    async fn expired_entries_are_invisible() {
        let cache = MemoryCacheBackend::new();
        cache.set("k", "v", 1).await.unwrap();
        // Force expiry by rewriting with an already-past deadline
        {
            let mut store = cache.store.lock().unwrap();
            store.get_mut("k").unwrap().expires_at =
                Some(Instant::now() - Duration::from_secs(1));
        }
        assert_eq!(cache.get("k").await.unwrap(), None);
        assert!(!cache.exists("k").await.unwrap());
    }

    #[tokio::test]
    async fn delete_reports_prior_existence() {
        let cache = MemoryCacheBackend::new();
        cache.set("k", "v", 0).await.unwrap();
        assert!(cache.delete("k").await.unwrap());
        assert!(!cache.delete("k").await.unwrap());
    }

    #[tokio::test]
    async fn clear_with_prefix_only_removes_matches() {
        let cache = MemoryCacheBackend::new();
        cache.set("search:a", "1", 0).await.unwrap();
        cache.set("search:b", "2", 0).await.unwrap();
        cache.set("other:c", "3", 0).await.unwrap();

        assert_eq!(cache.clear("search:").await.unwrap(), 2);
        assert_eq!(cache.get("other:c").await.unwrap().as_deref(), Some("3"));

        // Empty prefix clears everything remaining
        assert_eq!(cache.clear("").await.unwrap(), 1);
        assert_eq!(cache.stats().await.size, 0);
    }

    #[tokio::test]
    async fn stats_track_hits_and_misses() {
        let cache = MemoryCacheBackend::new();
        cache.set("k", "v", 0).await.unwrap();
        let _ = cache.get("k").await.unwrap();
        let _ = cache.get("absent").await.unwrap();

        let stats = cache.stats().await;
        assert_eq!(stats.backend, "memory");
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.size, 1);
    }

    #[tokio::test]
    async fn periodic_sweep_drops_expired_entries() {
        let cache = MemoryCacheBackend::new();
        cache.set("stale", "v", 1).await.unwrap();
        {
            let mut store = cache.store.lock().unwrap();
            store.get_mut("stale").unwrap().expires_at =
                Some(Instant::now() - Duration::from_secs(1));
        }
        // Drive the access counter across the sweep boundary without
        // touching the stale key
        for _ in 0..EVICTION_INTERVAL {
            let _ = cache.get("unrelated").await.unwrap();
        }
        let store = cache.store.lock().unwrap();
        assert!(!store.contains_key("stale"));
    }
}
