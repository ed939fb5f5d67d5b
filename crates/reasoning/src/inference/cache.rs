//! Inference result cache
//!
//! Bounded LRU with a per-entry TTL. Expiry is lazy: an expired entry is
//! dropped when it is next read, and counts as a miss. Each entry remembers
//! the round limit it was computed under; a lookup with a different limit
//! only hits when the cached closure had already converged.

use super::InferenceResult;
use graphmind_common::metrics;
use lru::LruCache;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

const CACHE_NAME: &str = "inference";

struct CacheEntry {
    result: InferenceResult,
    max_steps: usize,
    inserted_at: Instant,
}

impl CacheEntry {
    /// Whether running with `max_steps` rounds would give the cached result
    fn serves(&self, max_steps: usize) -> bool {
        if self.max_steps == max_steps {
            return true;
        }
        // Stopped before the limit, so more rounds add nothing
        let converged = self.result.rounds < self.max_steps;
        converged && max_steps >= self.result.rounds
    }
}

/// Cache statistics
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheStats {
    pub size: usize,

    pub max_size: usize,

    pub ttl_secs: u64,

    pub hits: u64,

    pub misses: u64,
}

/// Cache of inference results keyed by relation type and endpoints
pub struct InferenceCache {
    entries: Mutex<LruCache<String, CacheEntry>>,
    max_size: NonZeroUsize,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl InferenceCache {
    /// A `max_size` of 0 is treated as 1
    pub fn new(max_size: usize, ttl: Duration) -> Self {
        let max_size = NonZeroUsize::new(max_size).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(max_size)),
            max_size,
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// `"{relation_type}:{source or *}:{target or *}"`
    pub fn key(relation_type: &str, source_id: Option<&str>, target_id: Option<&str>) -> String {
        format!(
            "{}:{}:{}",
            relation_type,
            source_id.unwrap_or("*"),
            target_id.unwrap_or("*")
        )
    }

    /// Fetch a live entry computed under a compatible round limit and mark
    /// it most recently used
    pub async fn get(&self, key: &str, max_steps: usize) -> Option<InferenceResult> {
        let mut entries = self.entries.lock().await;

        let expired = match entries.get(key) {
            Some(entry) if entry.inserted_at.elapsed() >= self.ttl => true,
            Some(entry) if entry.serves(max_steps) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                metrics::record_cache(true, CACHE_NAME);
                debug!(key = %key, "Cache hit");
                return Some(entry.result.clone());
            }
            Some(entry) => {
                debug!(key = %key, cached_max_steps = entry.max_steps, max_steps, "Cached round limit differs");
                false
            }
            None => {
                debug!(key = %key, "Cache miss");
                false
            }
        };

        if expired {
            entries.pop(key);
            debug!(key = %key, "Cache entry expired");
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        metrics::record_cache(false, CACHE_NAME);
        None
    }

    /// Insert, evicting the least recently used entry when full
    pub async fn put(&self, key: impl Into<String>, result: InferenceResult, max_steps: usize) {
        let key = key.into();
        let mut entries = self.entries.lock().await;

        let entry = CacheEntry {
            result,
            max_steps,
            inserted_at: Instant::now(),
        };
        if let Some((evicted, _)) = entries.push(key.clone(), entry) {
            if evicted != key {
                debug!(key = %evicted, "Evicted least recently used entry");
            }
        }
    }

    pub async fn invalidate(&self, key: &str) -> bool {
        self.entries.lock().await.pop(key).is_some()
    }

    pub async fn clear(&self) {
        self.entries.lock().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn get_stats(&self) -> CacheStats {
        CacheStats {
            size: self.len().await,
            max_size: self.max_size.get(),
            ttl_secs: self.ttl.as_secs(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}
