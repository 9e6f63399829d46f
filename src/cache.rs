//! Query result cache
//!
//! A bounded LRU with a per-entry TTL. Reads refresh recency; inserts
//! at capacity evict the least-recently-accessed entry, sweeping
//! expired entries first. The cache is a hint: `get` may always miss
//! and `set` is best-effort, so correctness never depends on it.

use lru::LruCache;
use serde_json::Value as JsonValue;
use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

struct Entry {
    value: JsonValue,
    expires_at: Instant,
}

struct Inner {
    entries: LruCache<String, Entry>,
    hits: u64,
    misses: u64,
    evictions: u64,
}

/// A snapshot of cache occupancy and traffic counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub size: usize,
    pub capacity: usize,
    pub ttl_ms: u64,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

/// LRU result cache with per-entry TTL.
pub struct ResultCache {
    inner: Mutex<Inner>,
    capacity: usize,
    ttl: Duration,
}

impl ResultCache {
    /// Creates a cache holding at most `capacity` entries, each living
    /// for `ttl` after its last insert.
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Mutex::new(Inner {
                entries: LruCache::new(
                    NonZeroUsize::new(capacity).expect("capacity clamped to at least 1"),
                ),
                hits: 0,
                misses: 0,
                evictions: 0,
            }),
            capacity,
            ttl,
        }
    }

    /// Looks up a key, refreshing its recency. Expired entries are
    /// removed and count as misses.
    pub fn get(&self, key: &str) -> Option<JsonValue> {
        let mut inner = self.inner.lock().expect("cache lock poisoned");
        let expired = matches!(
            inner.entries.peek(key),
            Some(entry) if entry.expires_at <= Instant::now()
        );
        if expired {
            inner.entries.pop(key);
        }
        match inner.entries.get(key) {
            Some(entry) => {
                let value = entry.value.clone();
                inner.hits += 1;
                Some(value)
            }
            None => {
                inner.misses += 1;
                None
            }
        }
    }

    /// Inserts or overwrites a key, refreshing its deadline. At
    /// capacity, expired entries are swept before the LRU entry is
    /// evicted.
    pub fn set(&self, key: impl Into<String>, value: JsonValue) {
        let key = key.into();
        let mut inner = self.inner.lock().expect("cache lock poisoned");

        if inner.entries.len() == self.capacity && !inner.entries.contains(&key) {
            let now = Instant::now();
            let expired: Vec<String> = inner
                .entries
                .iter()
                .filter(|(_, entry)| entry.expires_at <= now)
                .map(|(k, _)| k.clone())
                .collect();
            for k in expired {
                inner.entries.pop(&k);
            }
        }

        let entry = Entry {
            value,
            expires_at: Instant::now() + self.ttl,
        };
        if let Some((evicted_key, _)) = inner.entries.push(key.clone(), entry) {
            if evicted_key != key {
                inner.evictions += 1;
            }
        }
    }

    /// Drops every entry. Counters survive.
    pub fn clear(&self) {
        let mut inner = self.inner.lock().expect("cache lock poisoned");
        inner.entries.clear();
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock().expect("cache lock poisoned");
        CacheStats {
            size: inner.entries.len(),
            capacity: self.capacity,
            ttl_ms: self.ttl.as_millis() as u64,
            hits: inner.hits,
            misses: inner.misses,
            evictions: inner.evictions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cache(capacity: usize, ttl_ms: u64) -> ResultCache {
        ResultCache::new(capacity, Duration::from_millis(ttl_ms))
    }

    #[test]
    fn set_then_get_returns_the_value() {
        let cache = cache(10, 60_000);
        cache.set("k", json!({"a": 1}));
        assert_eq!(cache.get("k"), Some(json!({"a": 1})));
    }

    #[test]
    fn second_set_overwrites() {
        let cache = cache(10, 60_000);
        cache.set("k", json!(1));
        cache.set("k", json!(2));
        assert_eq!(cache.get("k"), Some(json!(2)));
        // Overwriting the same key is not an eviction.
        assert_eq!(cache.stats().evictions, 0);
    }

    #[test]
    fn capacity_overflow_evicts_least_recently_accessed() {
        let cache = cache(2, 60_000);
        cache.set("a", json!("a"));
        cache.set("b", json!("b"));
        // Touch "a" so "b" becomes the eviction candidate.
        assert!(cache.get("a").is_some());
        cache.set("c", json!("c"));

        assert!(cache.get("a").is_some());
        assert!(cache.get("b").is_none());
        assert!(cache.get("c").is_some());
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn expired_entries_miss() {
        let cache = cache(10, 0);
        cache.set("k", json!(1));
        assert_eq!(cache.get("k"), None);
        assert_eq!(cache.stats().size, 0);
    }

    #[test]
    fn clear_empties_the_cache() {
        let cache = cache(10, 60_000);
        cache.set("a", json!(1));
        cache.set("b", json!(2));
        cache.clear();
        assert_eq!(cache.stats().size, 0);
        assert!(cache.get("a").is_none());
    }

    #[test]
    fn stats_reflect_traffic() {
        let cache = cache(3, 60_000);
        cache.set("a", json!(1));
        cache.get("a");
        cache.get("missing");
        let stats = cache.stats();
        assert_eq!(stats.size, 1);
        assert_eq!(stats.capacity, 3);
        assert_eq!(stats.ttl_ms, 60_000);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }
}
