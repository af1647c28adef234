//! Response caching for repeated chart requests
//!
//! Uses moka for thread-safe concurrent caching with TTL-based expiration.
//! Every ingest clears the whole cache and bumps its generation. A payload
//! computed under an older generation is never stored, so a scan that races
//! an ingest cannot write stale data back.

use moka::sync::Cache;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::data::SeriesFilter;
use crate::query::{AggregateFunction, DownsampleRequest, Payload, ResponseMode};

/// Cache key for a downsampling request
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct CacheKey {
    /// Bounds as raw `f64` bits so the key stays `Eq`
    start: Option<u64>,
    end: Option<u64>,
    target_width: i64,
    filter: SeriesFilter,
    function: AggregateFunction,
    mode: ResponseMode,
}

impl CacheKey {
    pub fn new(request: &DownsampleRequest) -> Self {
        Self {
            start: request.start.map(|s| s.as_f64().to_bits()),
            end: request.end.map(|e| e.as_f64().to_bits()),
            // Every width <= 0 means the same default
            target_width: request.target_width.max(0),
            filter: request.filter.clone(),
            function: request.function,
            mode: request.mode,
        }
    }
}

pub struct ResponseCache {
    cache: Cache<CacheKey, Payload>,
    hits: AtomicU64,
    misses: AtomicU64,
    /// Bumped on every invalidation
    generation: AtomicU64,
    ttl: Duration,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::with_config(1000, Duration::from_secs(30))
    }

    pub fn with_config(max_entries: u64, ttl: Duration) -> Self {
        Self {
            cache: Cache::builder()
                .max_capacity(max_entries)
                .time_to_live(ttl)
                .build(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            generation: AtomicU64::new(0),
            ttl,
        }
    }

    /// Build a cache from config values; capacity 0 turns caching off
    pub fn from_capacity(max_entries: u64, ttl_secs: u64) -> Option<Self> {
        if max_entries == 0 {
            None
        } else {
            Some(Self::with_config(max_entries, Duration::from_secs(ttl_secs)))
        }
    }

    pub fn get(&self, key: &CacheKey) -> Option<Payload> {
        if let Some(payload) = self.cache.get(key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            Some(payload)
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            None
        }
    }

    /// Read before computing a payload and hand it back to [`ResponseCache::put`]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Store a payload computed under `generation`; dropped if the cache has
    /// been invalidated since
    pub fn put(&self, key: CacheKey, payload: Payload, generation: u64) {
        if self.generation() != generation {
            return;
        }

        self.cache.insert(key.clone(), payload);

        // An invalidation between the check and the insert may have missed it
        if self.generation() != generation {
            self.cache.invalidate(&key);
        }
    }

    pub fn invalidate_all(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.cache.invalidate_all();
    }

    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;

        CacheStats {
            hits,
            misses,
            hit_rate: if total > 0 {
                hits as f64 / total as f64
            } else {
                0.0
            },
            entry_count: self.cache.entry_count(),
            ttl_secs: self.ttl.as_secs(),
        }
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Hit rate (0.0 - 1.0)
    pub hit_rate: f64,
    pub entry_count: u64,
    pub ttl_secs: u64,
}
