//! Redis response cache backend
//!
//! All keys are namespaced with a `sublarr:` prefix so a shared Redis
//! instance stays tidy. `clear` walks keys with cursor-based SCAN (batch
//! ~500) instead of KEYS so it never blocks concurrent readers.

use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{Context, Result};
use async_trait::async_trait;
use redis::{AsyncCommands, aio::ConnectionManager};
use tracing::debug;

use super::{CacheStats, ResponseCache};

/// Namespace prefix for every Sublarr cache key
const KEY_PREFIX: &str = "sublarr:";

/// Batch size for SCAN-based deletion
const SCAN_BATCH_SIZE: u64 = 500;

pub struct RedisCacheBackend {
    conn: ConnectionManager,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl std::fmt::Debug for RedisCacheBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCacheBackend")
            .field("connection", &"ConnectionManager")
            .finish()
    }
}

impl RedisCacheBackend {
    /// Connect and verify the server responds to PING
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url).context("Failed to create Redis client")?;
        let mut conn = ConnectionManager::new(client)
            .await
            .context("Failed to connect to Redis")?;

        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .context("Redis PING failed")?;

        Ok(Self {
            conn,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        })
    }

    fn prefixed(key: &str) -> String {
        format!("{KEY_PREFIX}{key}")
    }

    /// SCAN all keys matching `pattern`, invoking `action` per batch
    async fn scan_batches<F>(&self, pattern: &str, mut action: F) -> Result<u64>
    where
        F: AsyncFnMut(&mut ConnectionManager, Vec<String>) -> Result<u64>,
    {
        let mut conn = self.conn.clone();
        let mut total = 0u64;
        let mut cursor = 0u64;
        loop {
            let (next_cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH_SIZE)
                .query_async(&mut conn)
                .await
                .context("Redis SCAN failed")?;

            if !keys.is_empty() {
                total += action(&mut conn, keys).await?;
            }
            if next_cursor == 0 {
                break;
            }
            cursor = next_cursor;
        }
        Ok(total)
    }
}

#[async_trait]
impl ResponseCache for RedisCacheBackend {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn
            .get(Self::prefixed(key))
            .await
            .context("Redis GET failed")?;

        if value.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<()> {
        let mut conn = self.conn.clone();
        let prefixed = Self::prefixed(key);
        if ttl_seconds > 0 {
            conn.set_ex::<_, _, ()>(prefixed, value, ttl_seconds)
                .await
                .context("Redis SETEX failed")?;
        } else {
            conn.set::<_, _, ()>(prefixed, value)
                .await
                .context("Redis SET failed")?;
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        let deleted: u64 = conn
            .del(Self::prefixed(key))
            .await
            .context("Redis DEL failed")?;
        Ok(deleted > 0)
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        let exists: bool = conn
            .exists(Self::prefixed(key))
            .await
            .context("Redis EXISTS failed")?;
        Ok(exists)
    }

    async fn clear(&self, prefix: &str) -> Result<u64> {
        let pattern = format!("{KEY_PREFIX}{prefix}*");
        let deleted = self
            .scan_batches(&pattern, async |conn, keys| {
                let count: u64 = conn.del(keys).await.context("Redis DEL failed")?;
                Ok(count)
            })
            .await?;
        debug!("Cleared {deleted} cache keys matching '{pattern}'");
        Ok(deleted)
    }

    async fn stats(&self) -> CacheStats {
        // Approximate size: count namespaced keys via SCAN
        let size = self
            .scan_batches(&format!("{KEY_PREFIX}*"), async |_conn, keys| {
                Ok(keys.len() as u64)
            })
            .await
            .unwrap_or(0);

        CacheStats {
            backend: "redis".to_string(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            size,
        }
    }
}
