//! In-memory response cache.

use crate::key::CacheKey;
use crate::stats::{format_hit_rate, CacheStats, Counters};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// A stored payload plus bookkeeping.
#[derive(Debug)]
pub struct CacheEntry<V> {
    payload: V,
    stored_at: Instant,
    hit_count: u64,
}

impl<V> CacheEntry<V> {
    fn new(payload: V, stored_at: Instant) -> Self {
        Self {
            payload,
            stored_at,
            hit_count: 0,
        }
    }

    /// Stale once the entry's age reaches the TTL, so a zero TTL never serves.
    fn is_expired(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.stored_at) >= ttl
    }

    pub fn payload(&self) -> &V {
        &self.payload
    }

    pub fn stored_at(&self) -> Instant {
        self.stored_at
    }

    pub fn hit_count(&self) -> u64 {
        self.hit_count
    }
}

/// Bounded, TTL-based cache.
///
/// All reads and writes go through one lock, so a reader either clones a
/// complete payload or sees a miss; eviction can never hand out a partially
/// removed entry. Payloads are cloned out, so `V` should be cheap to clone
/// (an `Arc` or a `Bytes`-backed value).
pub struct ResponseCache<V> {
    entries: Mutex<HashMap<CacheKey, CacheEntry<V>>>,
    ttl: Duration,
    max_size: usize,
    enabled: AtomicBool,
    counters: Counters,
}

impl<V: Clone> ResponseCache<V> {
    /// Create an enabled cache.
    pub fn new(ttl: Duration, max_size: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
            max_size,
            enabled: AtomicBool::new(true),
            counters: Counters::default(),
        }
    }

    /// Create a cache that starts enabled or disabled.
    pub fn with_enabled(ttl: Duration, max_size: usize, enabled: bool) -> Self {
        let cache = Self::new(ttl, max_size);
        cache.enabled.store(enabled, Ordering::Relaxed);
        cache
    }

    /// Look up `key`, counting a hit or a miss.
    ///
    /// An expired entry is removed on the spot and reported as a miss.
    pub fn get(&self, key: &CacheKey) -> Option<V> {
        if !self.is_enabled() {
            self.counters.miss();
            return None;
        }

        let now = Instant::now();
        let mut entries = self.entries.lock();

        match entries.get_mut(key) {
            None => {
                self.counters.miss();
                debug!(key = %key, "Cache miss");
                return None;
            }
            Some(entry) if !entry.is_expired(now, self.ttl) => {
                entry.hit_count += 1;
                self.counters.hit();
                debug!(key = %key, hits = entry.hit_count, "Cache hit");
                return Some(entry.payload.clone());
            }
            Some(_) => {}
        }

        entries.remove(key);
        self.counters.miss();
        debug!(key = %key, "Cache miss (expired)");
        None
    }

    /// Store `payload` under `key` with a fresh timestamp and zero hits.
    ///
    /// A full store is evicted first, so the size bound holds once this
    /// returns. No-op while the cache is disabled.
    pub fn set(&self, key: CacheKey, payload: V) {
        let now = Instant::now();
        let mut entries = self.entries.lock();

        // Checked under the lock so a concurrent disable cannot be undone.
        if !self.is_enabled() {
            return;
        }

        if entries.len() >= self.capacity() {
            self.evict(&mut entries, now);
        }

        debug!(key = %key, ttl_secs = self.ttl.as_secs(), "Cache set");
        entries.insert(key, CacheEntry::new(payload, now));
    }

    /// Remove every entry. Counters are kept.
    pub fn clear(&self) {
        self.entries.lock().clear();
        debug!("Cache cleared");
    }

    /// Snapshot of size, limits and counters.
    pub fn stats(&self) -> CacheStats {
        let hits = self.counters.hits();
        let misses = self.counters.misses();
        CacheStats {
            size: self.len(),
            max_size: self.max_size,
            ttl_seconds: self.ttl.as_secs(),
            hits,
            misses,
            evictions: self.counters.evictions(),
            enabled: self.is_enabled(),
            hit_rate: format_hit_rate(hits, misses),
        }
    }

    /// Turn caching on or off. Turning it off drops every entry.
    pub fn set_enabled(&self, enabled: bool) {
        let mut entries = self.entries.lock();
        let was = self.enabled.swap(enabled, Ordering::Relaxed);
        if was && !enabled {
            entries.clear();
            debug!("Cache disabled and cleared");
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Whether a live entry exists for `key`, without touching counters.
    pub fn contains(&self, key: &CacheKey) -> bool {
        let now = Instant::now();
        self.entries
            .lock()
            .get(key)
            .is_some_and(|e| !e.is_expired(now, self.ttl))
    }

    /// Number of stored entries, expired ones included until they are swept.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    // A zero-sized cache still holds one entry.
    fn capacity(&self) -> usize {
        self.max_size.max(1)
    }

    fn evict(&self, entries: &mut HashMap<CacheKey, CacheEntry<V>>, now: Instant) {
        let before = entries.len();
        let ttl = self.ttl;
        entries.retain(|_, entry| !entry.is_expired(now, ttl));

        if entries.len() >= self.capacity() {
            let mut ranked: Vec<(u64, Instant, CacheKey)> = entries
                .iter()
                .map(|(key, entry)| (entry.hit_count, entry.stored_at, key.clone()))
                .collect();
            ranked.sort_by_key(|(hits, stored_at, _)| (*hits, *stored_at));

            let to_remove = (ranked.len() / 5).max(1);
            for (_, _, key) in ranked.into_iter().take(to_remove) {
                entries.remove(&key);
            }
        }

        let evicted = before - entries.len();
        self.counters.evicted(evicted);
        debug!(evicted, remaining = entries.len(), "Cache eviction");
    }
}
