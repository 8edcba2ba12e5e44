use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use lru::LruCache;
use parking_lot::Mutex;
use serde::Serialize;

use crate::clock::{Clock, SystemClock};

#[derive(Debug, Clone)]
struct Entry<V> {
    value: V,
    created_at: Instant,
    ttl: Duration,
}

impl<V> Entry<V> {
    fn is_live(&self, now: Instant) -> bool {
        now < self.created_at + self.ttl
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct CacheStats {
    pub size: usize,
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
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

/// Thread-safe LRU cache with per-entry TTL.
///
/// An entry is visible to `get` only while `now < created_at + ttl`. Expired
/// entries are dropped lazily when touched and eagerly when an insert would
/// otherwise evict a live entry. The lock is held for the map operation only;
/// values are cloned out so callers never compute under it.
pub struct TtlLruCache<V> {
    inner: Mutex<LruCache<String, Entry<V>>>,
    default_ttl: Duration,
    clock: Arc<dyn Clock>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
}

impl<V: Clone> TtlLruCache<V> {
    pub fn new(capacity: usize, default_ttl: Duration) -> Self {
        Self::with_clock(capacity, default_ttl, Arc::new(SystemClock))
    }

    /// A zero capacity is clamped to one.
    pub fn with_clock(capacity: usize, default_ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(LruCache::new(cap)),
            default_ttl,
            clock,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            expirations: AtomicU64::new(0),
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Returns a clone of the live value and promotes it to most-recently-used.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now();
        let mut map = self.inner.lock();
        let live = map.peek(key).map(|e| e.is_live(now));
        let found = match live {
            Some(true) => map.get(key).map(|e| e.value.clone()),
            Some(false) => {
                map.pop(key);
                self.expirations.fetch_add(1, Ordering::Relaxed);
                None
            }
            None => None,
        };
        drop(map);

        let counter = if found.is_some() { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    /// Inserts or replaces `key`. `ttl` falls back to the cache default.
    pub fn set(&self, key: impl Into<String>, value: V, ttl: Option<Duration>) {
        let key = key.into();
        let now = self.clock.now();
        let entry = Entry { value, created_at: now, ttl: ttl.unwrap_or(self.default_ttl) };

        let mut map = self.inner.lock();
        if !map.contains(&key) && map.len() >= map.cap().get() {
            let purged = purge_locked(&mut map, now);
            self.expirations.fetch_add(purged as u64, Ordering::Relaxed);
        }
        if let Some((evicted, _)) = map.push(key.clone(), entry) {
            if evicted != key {
                self.evictions.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn delete(&self, key: &str) -> bool {
        self.inner.lock().pop(key).is_some()
    }

    /// Number of stored entries, including expired ones not yet purged.
    pub fn size(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().cap().get()
    }

    pub fn clear(&self) {
        self.inner.lock().clear();
    }

    /// Drops every expired entry and returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let purged = purge_locked(&mut self.inner.lock(), now);
        self.expirations.fetch_add(purged as u64, Ordering::Relaxed);
        purged
    }

    /// Keys from most- to least-recently used.
    pub fn keys(&self) -> Vec<String> {
        self.inner.lock().iter().map(|(k, _)| k.clone()).collect()
    }

    pub fn stats(&self) -> CacheStats {
        let (size, capacity) = {
            let map = self.inner.lock();
            (map.len(), map.cap().get())
        };
        CacheStats {
            size,
            capacity,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
        }
    }
}

fn purge_locked<V>(map: &mut LruCache<String, Entry<V>>, now: Instant) -> usize {
    let expired: Vec<String> = map.iter().filter(|(_, e)| !e.is_live(now)).map(|(k, _)| k.clone()).collect();
    for key in &expired {
        map.pop(key);
    }
    expired.len()
}
