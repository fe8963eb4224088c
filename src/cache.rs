//! TTL caching for authority-supplied values.
//!
//! One [`TtlCache`] instance backs each cached concern: the signing key set,
//! the discovery document, the client-credentials token, and the per-subject
//! refresh checkpoints. Values are replaced wholesale on refresh, never
//! merged.
//!
//! # Not a lock
//!
//! [`TtlCache::remember`] is cache-aside de-duplication, not mutual
//! exclusion: two tasks that both observe a miss will both run the producer
//! and the last write wins. Callers that need stricter guarantees should put
//! a per-key mutex (or a compare-and-swap "claim" entry) in front of it.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::Result;

/// Thread-safe cache with per-entry TTL expiry.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use sso_guard::cache::TtlCache;
///
/// # tokio_test::block_on(async {
/// let cache: TtlCache<u32> = TtlCache::new();
/// let value = cache
///     .remember("answer", Duration::from_secs(60), || async { Ok(42) })
///     .await
///     .unwrap();
/// assert_eq!(*value, 42);
/// # });
/// ```
pub struct TtlCache<V> {
    entries: DashMap<String, CachedEntry<V>>,
    stats: CacheStats,
}

/// A cached value with TTL metadata.
struct CachedEntry<V> {
    value: Arc<V>,
    cached_at: Instant,
    ttl: Duration,
}

impl<V> CachedEntry<V> {
    fn is_expired(&self) -> bool {
        Instant::now().duration_since(self.cached_at) > self.ttl
    }
}

/// Cache statistics tracked atomically.
#[derive(Debug, Default)]
struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

/// Snapshot of cache statistics.
#[derive(Debug, Clone, Copy)]
pub struct CacheStatsSnapshot {
    /// Total cache hits.
    pub hits: u64,
    /// Total cache misses (absent or expired).
    pub misses: u64,
    /// Expired entries removed on read.
    pub evictions: u64,
    /// Current number of entries, expired ones included.
    pub size: usize,
}

impl<V> TtlCache<V> {
    /// Create a new empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            stats: CacheStats::default(),
        }
    }

    /// Get a cached value if it exists and has not expired.
    ///
    /// Expired entries are evicted on read and never served.
    pub fn get(&self, key: &str) -> Option<Arc<V>> {
        if let Some(entry) = self.entries.get(key) {
            if entry.is_expired() {
                drop(entry);
                self.entries.remove(key);
                self.stats.evictions.fetch_add(1, Ordering::Relaxed);
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
                None
            } else {
                self.stats.hits.fetch_add(1, Ordering::Relaxed);
                Some(Arc::clone(&entry.value))
            }
        } else {
            self.stats.misses.fetch_add(1, Ordering::Relaxed);
            None
        }
    }

    /// Store a value under `key` for `ttl`, replacing any previous entry.
    pub fn put(&self, key: &str, value: V, ttl: Duration) {
        let entry = CachedEntry {
            value: Arc::new(value),
            cached_at: Instant::now(),
            ttl,
        };
        self.entries.insert(key.to_string(), entry);
    }

    /// Return the cached value for `key`, or run `producer` and cache its
    /// result for `ttl`.
    ///
    /// A failing producer caches nothing: the error is returned and the next
    /// call starts from a miss again. See the module docs for the concurrent
    /// double-produce caveat.
    pub async fn remember<F, Fut>(&self, key: &str, ttl: Duration, producer: F) -> Result<Arc<V>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>>,
    {
        if let Some(value) = self.get(key) {
            return Ok(value);
        }
        let value = Arc::new(producer().await?);
        let entry = CachedEntry {
            value: Arc::clone(&value),
            cached_at: Instant::now(),
            ttl,
        };
        self.entries.insert(key.to_string(), entry);
        Ok(value)
    }

    /// Clear all cached entries.
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Get cache statistics.
    pub fn stats(&self) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            hits: self.stats.hits.load(Ordering::Relaxed),
            misses: self.stats.misses.load(Ordering::Relaxed),
            evictions: self.stats.evictions.load(Ordering::Relaxed),
            size: self.entries.len(),
        }
    }
}

impl<V> Default for TtlCache<V> {
    fn default() -> Self {
        Self::new()
    }
}
