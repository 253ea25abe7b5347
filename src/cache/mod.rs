//! Caching layer for decisions.
//!
//! For a fixed policy table a decision is a pure function of the signal, so
//! decisions are cached by a digest of the signal itself.

use crate::api::Decision;
use crate::signal::Signal;

use lru::LruCache;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// An LRU cache of decisions with per-entry expiry.
pub struct DecisionCache {
    entries: Mutex<LruCache<String, CachedDecision>>,
    /// TTL for cached entries
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

/// A cached decision with expiration time.
struct CachedDecision {
    decision: Decision,
    expires_at: Instant,
}

impl DecisionCache {
    /// Create a new decision cache.
    pub fn new(max_entries: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Get a cached decision for the given signal.
    pub fn get(&self, signal: &Signal) -> Option<Decision> {
        let key = Self::compute_key(signal);
        let mut entries = self.entries.lock();

        if let Some(cached) = entries.get(&key) {
            if cached.expires_at > Instant::now() {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(cached.decision.clone());
            }
            entries.pop(&key);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Cache a decision for the given signal.
    pub fn put(&self, signal: &Signal, decision: &Decision) {
        let key = Self::compute_key(signal);
        let cached = CachedDecision {
            decision: decision.clone(),
            expires_at: Instant::now() + self.ttl,
        };
        self.entries.lock().put(key, cached);
    }

    /// Clear all cached entries.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Get cache statistics.
    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let hit_rate = if total > 0 {
            (hits as f64 / total as f64) * 100.0
        } else {
            0.0
        };

        CacheStats {
            hits,
            misses,
            size: self.entries.lock().len(),
            hit_rate,
        }
    }

    /// Blake3 digest of the signal's JSON form.
    ///
    /// Signal sets are ordered, so equal signals always serialize identically.
    fn compute_key(signal: &Signal) -> String {
        let json = serde_json::to_vec(signal).unwrap_or_default();
        blake3::hash(&json).to_hex().to_string()
    }
}

/// Cache statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStats {
    /// Number of cache hits
    pub hits: u64,
    /// Number of cache misses
    pub misses: u64,
    /// Current cache size
    pub size: usize,
    /// Hit rate percentage
    pub hit_rate: f64,
}
