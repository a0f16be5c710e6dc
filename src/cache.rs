//! Bounded LRU caches shared across render workers.
//!
//! Two instances exist per process: the decoded-image cache (one per
//! conversion run) and the parsed intermediate-document cache (process-wide,
//! in [`crate::pipeline::merge`]). Both are hit concurrently from the worker
//! pool, so the map lives behind a `Mutex` with critical sections limited to
//! a single get or insert — decode and encode work never happens under the
//! lock. Values are handed out as `Arc` clones so an eviction cannot
//! invalidate data a worker is still using.

use lru::LruCache;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

/// A fixed-capacity key→value cache with least-recently-used eviction.
pub struct BoundedCache<K, V> {
    inner: Mutex<LruCache<K, Arc<V>>>,
}

impl<K: Hash + Eq, V> BoundedCache<K, V> {
    /// Create a cache holding at most `capacity` entries.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(LruCache::new(
                NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::new(1).expect("1 is non-zero")),
            )),
        }
    }

    /// Get a cached value, promoting it in the LRU order.
    #[must_use]
    pub fn get(&self, key: &K) -> Option<Arc<V>> {
        self.inner.lock().expect("cache lock poisoned").get(key).cloned()
    }

    /// Insert a value, evicting the least-recently-used entry if full.
    /// Returns an `Arc` to the stored value.
    pub fn insert(&self, key: K, value: V) -> Arc<V> {
        let arc = Arc::new(value);
        self.inner
            .lock()
            .expect("cache lock poisoned")
            .put(key, arc.clone());
        arc
    }

    /// Number of cached entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().expect("cache lock poisoned").len()
    }

    /// Check if the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cache capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.inner.lock().expect("cache lock poisoned").cap().get()
    }

    /// Drop all cached entries.
    pub fn clear(&self) {
        self.inner.lock().expect("cache lock poisoned").clear();
    }
}
