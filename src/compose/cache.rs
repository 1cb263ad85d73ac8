//! Bounded store of encoded composites.
//!
//! # Design Decisions
//! - No eviction and no TTL: once `max_entries` is reached the cache is frozen
//!   and further inserts are refused, while existing entries stay servable
//! - Entry count is tracked in an atomic so the bound is checked without
//!   walking every shard; a slot is reserved with compare-and-swap while the
//!   key's shard entry is held, so concurrent inserts can never overshoot
//! - Values are `Bytes`, so handing one out is a reference-count bump

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::compose::key::CacheKey;
use crate::observability::metrics;

/// A thread-safe, capacity-bounded map from cache key to encoded output.
#[derive(Clone)]
pub struct CompositeCache {
    inner: Arc<DashMap<CacheKey, Bytes>>,
    len: Arc<AtomicUsize>,
    max_entries: usize,
}

impl CompositeCache {
    /// Create an empty cache holding at most `max_entries` composites.
    pub fn new(max_entries: usize) -> Self {
        Self {
            inner: Arc::new(DashMap::new()),
            len: Arc::new(AtomicUsize::new(0)),
            max_entries,
        }
    }

    /// Look up a stored composite.
    pub fn get(&self, key: &CacheKey) -> Option<Bytes> {
        self.inner.get(key).map(|r| r.value().clone())
    }

    /// Store a composite if the cache still has room.
    ///
    /// Returns whether the value was stored. Replacing an existing key is
    /// allowed only while below capacity, matching a plain "check size, then
    /// assign" map.
    pub fn put(&self, key: CacheKey, value: Bytes) -> bool {
        let stored = match self.inner.entry(key) {
            Entry::Occupied(mut occupied) => {
                if self.len.load(Ordering::Acquire) < self.max_entries {
                    occupied.insert(value);
                    true
                } else {
                    false
                }
            }
            Entry::Vacant(vacant) => {
                if self.try_reserve_slot() {
                    vacant.insert(value);
                    true
                } else {
                    false
                }
            }
        };

        metrics::record_cache_insert(stored, self.len());
        stored
    }

    fn try_reserve_slot(&self) -> bool {
        let mut prev = self.len.load(Ordering::Acquire);
        loop {
            if prev >= self.max_entries {
                return false;
            }
            match self.len.compare_exchange_weak(prev, prev + 1, Ordering::AcqRel, Ordering::Acquire) {
                Ok(_) => return true,
                Err(actual) => prev = actual,
            }
        }
    }

    /// Number of stored composites.
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Configured upper bound on stored composites.
    pub fn capacity(&self) -> usize {
        self.max_entries
    }

    /// Whether further distinct keys will be refused.
    pub fn is_full(&self) -> bool {
        self.len() >= self.max_entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(n: u8) -> CacheKey {
        CacheKey::new("top", "bottom", n)
    }

    #[test]
    fn test_get_and_put() {
        let cache = CompositeCache::new(4);
        assert!(cache.get(&key(1)).is_none());

        assert!(cache.put(key(1), Bytes::from_static(b"one")));
        assert_eq!(cache.get(&key(1)).unwrap(), Bytes::from_static(b"one"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_duplicate_put_replaces_without_counting_twice() {
        let cache = CompositeCache::new(4);
        assert!(cache.put(key(1), Bytes::from_static(b"a")));
        assert!(cache.put(key(1), Bytes::from_static(b"b")));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&key(1)).unwrap(), Bytes::from_static(b"b"));
    }

    #[test]
    fn test_frozen_at_capacity() {
        let cache = CompositeCache::new(2);
        assert!(cache.put(key(1), Bytes::from_static(b"1")));
        assert!(cache.put(key(2), Bytes::from_static(b"2")));
        assert!(cache.is_full());

        assert!(!cache.put(key(3), Bytes::from_static(b"3")));
        assert!(cache.get(&key(3)).is_none());
        assert_eq!(cache.len(), 2);

        // existing entries stay servable and are not overwritten once full
        assert!(!cache.put(key(1), Bytes::from_static(b"x")));
        assert_eq!(cache.get(&key(1)).unwrap(), Bytes::from_static(b"1"));
    }

    #[test]
    fn test_zero_capacity_stores_nothing() {
        let cache = CompositeCache::new(0);
        assert!(!cache.put(key(1), Bytes::from_static(b"1")));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_concurrent_puts_respect_bound() {
        let cache = CompositeCache::new(50);
        let handles: Vec<_> = (0..8u8)
            .map(|t| {
                let cache = cache.clone();
                std::thread::spawn(move || {
                    for i in 0..100u8 {
                        let k = CacheKey::new(&format!("t{t}"), "b", i);
                        cache.put(k, Bytes::from_static(b"v"));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(cache.len(), 50);
        assert_eq!(cache.inner.len(), 50);
    }
}
