//! Bounded TTL cache over an LRU core
//!
//! Keys are `(endpoint, parameters)` fingerprints built by the callers.
//! Eviction is O(1) amortized: LRU handles capacity, expiry is checked
//! lazily on read. Hit/miss/size stats feed metric events.

use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Cache counters surfaced as metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub size: usize,
}

/// Bounded LRU cache with per-cache TTL.
pub struct TtlCache<V> {
    inner: Mutex<LruCache<String, (Instant, V)>>,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Fetch a live entry; expired entries are evicted on the way.
    pub fn get(&self, key: &str) -> Option<V> {
        let mut inner = self.inner.lock().ok()?;
        match inner.get(key) {
            Some((inserted, value)) if inserted.elapsed() < self.ttl => {
                let value = value.clone();
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(value)
            }
            Some(_) => {
                inner.pop(key);
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub fn put(&self, key: String, value: V) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.put(key, (Instant::now(), value));
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            size: self.inner.lock().map(|c| c.len()).unwrap_or(0),
        }
    }

    /// Build the canonical `(endpoint, parameters)` key.
    pub fn key(endpoint: &str, params: &[&str]) -> String {
        format!("{endpoint}?{}", params.join("&"))
    }
}
