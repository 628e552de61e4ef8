//! Two-tier response cache for external source queries
//!
//! A moka in-process cache fronts a SQLite store so repeated queries within
//! a run never touch the network and results survive across runs. Entries
//! are keyed by SHA-256 of `{source}|{query}` and expire after the
//! configured TTL; expired rows are never served and are purged
//! opportunistically.

use chrono::Utc;
use moka::future::Cache as MokaCache;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, warn};

use crate::models::Source;

const HOT_TIER_CAPACITY: u64 = 1024;

/// Cache errors
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Hit/miss counters plus the persistent row count
#[derive(Debug, Clone, Copy)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub persistent_entries: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Compute the cache key for a (source, query) pair
pub fn cache_key(source: &str, query: &str) -> String {
    use sha2::{Digest, Sha256};

    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    hasher.update(b"|");
    hasher.update(query.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// TTL cache over parsed source lists
pub struct ResponseCache {
    hot: MokaCache<String, Vec<Source>>,
    conn: Mutex<Connection>,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ResponseCache {
    /// Open (or create) the persistent store at `path`
    pub fn open(path: &Path, ttl: Duration) -> Result<Self, CacheError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        Self::with_connection(conn, ttl)
    }

    /// Fully in-memory store, used by tests
    pub fn in_memory(ttl: Duration) -> Result<Self, CacheError> {
        Self::with_connection(Connection::open_in_memory()?, ttl)
    }

    fn with_connection(conn: Connection, ttl: Duration) -> Result<Self, CacheError> {
        conn.execute_batch(include_str!("schema.sql"))?;

        let cache = Self {
            hot: MokaCache::builder()
                .max_capacity(HOT_TIER_CAPACITY)
                .time_to_live(ttl)
                .build(),
            conn: Mutex::new(conn),
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        };

        let purged = cache.purge_expired()?;
        if purged > 0 {
            debug!("Purged {} expired cache entries on open", purged);
        }
        Ok(cache)
    }

    /// Look up cached sources for a (source, query) pair
    ///
    /// Cache failures degrade to a miss; the caller re-queries the network.
    pub async fn get(&self, source: &str, query: &str) -> Option<Vec<Source>> {
        let key = cache_key(source, query);

        if let Some(sources) = self.hot.get(&key).await {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Some(sources);
        }

        match self.load_persistent(&key) {
            Ok(Some(sources)) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                self.hot.insert(key, sources.clone()).await;
                Some(sources)
            }
            Ok(None) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            Err(e) => {
                warn!("Cache lookup failed, treating as miss: {}", e);
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Store the sources returned for a (source, query) pair
    pub async fn put(&self, source: &str, query: &str, sources: &[Source]) {
        let key = cache_key(source, query);

        if let Err(e) = self.store_persistent(&key, source, sources) {
            warn!("Failed to persist cache entry: {}", e);
        }
        self.hot.insert(key, sources.to_vec()).await;
    }

    /// Remove expired rows; returns how many were deleted
    pub fn purge_expired(&self) -> Result<usize, CacheError> {
        let conn = self.conn.lock().unwrap();
        let deleted = conn.execute(
            "DELETE FROM api_cache WHERE expires_at <= ?1",
            params![Utc::now().timestamp_millis()],
        )?;
        Ok(deleted)
    }

    pub fn stats(&self) -> CacheStats {
        let persistent_entries = {
            let conn = self.conn.lock().unwrap();
            conn.query_row("SELECT COUNT(*) FROM api_cache", [], |row| row.get::<_, u64>(0))
                .unwrap_or(0)
        };
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            persistent_entries,
        }
    }

    fn load_persistent(&self, key: &str) -> Result<Option<Vec<Source>>, CacheError> {
        let conn = self.conn.lock().unwrap();

        let row: Option<(String, i64)> = conn
            .query_row(
                "SELECT payload, expires_at FROM api_cache WHERE query_hash = ?1",
                params![key],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((payload, expires_at)) = row else {
            return Ok(None);
        };

        if expires_at <= Utc::now().timestamp_millis() {
            conn.execute("DELETE FROM api_cache WHERE query_hash = ?1", params![key])?;
            return Ok(None);
        }

        Ok(Some(serde_json::from_str(&payload)?))
    }

    fn store_persistent(&self, key: &str, source: &str, sources: &[Source]) -> Result<(), CacheError> {
        let payload = serde_json::to_string(sources)?;
        let now = Utc::now().timestamp_millis();
        let expires_at = now + self.ttl.as_millis() as i64;

        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO api_cache (query_hash, source, payload, created_at, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![key, source, payload, now, expires_at],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SourceKind;

    fn sample_sources() -> Vec<Source> {
        vec![Source::new(
            "https://en.wikipedia.org/wiki/Berlin_Wall",
            "Berlin Wall",
            "The Berlin Wall fell in 1989.",
            SourceKind::Encyclopedia,
            0.9,
        )]
    }

    #[test]
    fn test_cache_key_is_stable_and_distinct() {
        let a = cache_key("wikipedia", "berlin wall");
        let b = cache_key("wikipedia", "berlin wall");
        let c = cache_key("newsapi", "berlin wall");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }

    #[tokio::test]
    async fn test_put_then_get_round_trip() {
        let cache = ResponseCache::in_memory(Duration::from_secs(60)).unwrap();
        assert!(cache.get("wikipedia", "berlin wall").await.is_none());

        cache.put("wikipedia", "berlin wall", &sample_sources()).await;

        let cached = cache.get("wikipedia", "berlin wall").await.unwrap();
        assert_eq!(cached.len(), 1);
        assert_eq!(cached[0].title, "Berlin Wall");

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.persistent_entries, 1);
    }

    #[tokio::test]
    async fn test_expired_entries_are_not_served() {
        let cache = ResponseCache::in_memory(Duration::from_millis(30)).unwrap();
        cache.put("wikipedia", "berlin wall", &sample_sources()).await;

        tokio::time::sleep(Duration::from_millis(60)).await;

        assert!(cache.get("wikipedia", "berlin wall").await.is_none());
    }

    #[tokio::test]
    async fn test_purge_expired_removes_rows() {
        let cache = ResponseCache::in_memory(Duration::from_millis(10)).unwrap();
        cache.put("wikipedia", "a", &sample_sources()).await;
        cache.put("wikipedia", "b", &sample_sources()).await;

        tokio::time::sleep(Duration::from_millis(30)).await;

        let purged = cache.purge_expired().unwrap();
        assert_eq!(purged, 2);
        assert_eq!(cache.stats().persistent_entries, 0);
    }

    #[tokio::test]
    async fn test_entries_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("api_cache.db");

        {
            let cache = ResponseCache::open(&path, Duration::from_secs(60)).unwrap();
            cache.put("wikipedia", "berlin wall", &sample_sources()).await;
        }

        let cache = ResponseCache::open(&path, Duration::from_secs(60)).unwrap();
        let cached = cache.get("wikipedia", "berlin wall").await.unwrap();
        assert_eq!(cached[0].title, "Berlin Wall");
    }

    #[tokio::test]
    async fn test_persistent_tier_survives_hot_eviction() {
        // Simulate a fresh process by clearing the hot tier only
        let cache = ResponseCache::in_memory(Duration::from_secs(60)).unwrap();
        cache.put("google", "apple founding", &sample_sources()).await;
        cache.hot.invalidate_all();
        cache.hot.run_pending_tasks().await;

        let cached = cache.get("google", "apple founding").await;
        assert!(cached.is_some());
    }
}
