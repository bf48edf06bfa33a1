//! core::cache
//!
//! Fixed-capacity, least-recently-used map.
//!
//! The sync engine memoizes two things with it: the set of tracked
//! `(path, blob)` pairs per commit, and the parsed file plus graph contexts
//! per `(path, blob)`. A cache holds no business logic. Dropping every entry
//! is always safe and only costs re-reads from the object store.
//!
//! # Concurrency
//!
//! Readers may share a cache across threads. Every access promotes the key,
//! so even `get` mutates recency bookkeeping; that bookkeeping sits behind a
//! `parking_lot::Mutex`.
//!
//! # Example
//!
//! ```
//! use quadvc::core::cache::Cache;
//!
//! let cache = Cache::new(2);
//! cache.set("a", 1);
//! cache.set("b", 2);
//! assert_eq!(cache.get(&"a"), Some(1));
//!
//! // "b" is now least recently used and is evicted first.
//! cache.set("c", 3);
//! assert!(!cache.contains(&"b"));
//! assert_eq!(cache.size(), 2);
//! ```

use std::hash::Hash;
use std::num::NonZeroUsize;

use lru::LruCache;
use parking_lot::Mutex;

/// Thread-safe LRU map.
///
/// Values are cloned out on `get`; store `Arc`s for anything large.
pub struct Cache<K, V> {
    entries: Mutex<LruCache<K, V>>,
}

impl<K: Hash + Eq, V: Clone> Cache<K, V> {
    /// Create a cache holding at most `capacity` entries.
    ///
    /// A capacity of zero is clamped to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Look up a key and mark it most recently used.
    ///
    /// A miss is `None`. Callers treat it as the signal to read through to
    /// the backing store.
    pub fn get(&self, key: &K) -> Option<V> {
        self.entries.lock().get(key).cloned()
    }

    /// Insert or overwrite a value, marking it most recently used.
    ///
    /// Inserting a new key into a full cache evicts exactly one entry, the
    /// least recently used.
    pub fn set(&self, key: K, value: V) {
        self.entries.lock().put(key, value);
    }

    /// Remove a key. Missing keys are ignored.
    pub fn remove(&self, key: &K) {
        self.entries.lock().pop(key);
    }

    /// Membership test without touching recency.
    pub fn contains(&self, key: &K) -> bool {
        self.entries.lock().contains(key)
    }

    /// Number of entries currently held.
    pub fn size(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    pub fn capacity(&self) -> usize {
        self.entries.lock().cap().get()
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

impl<K, V> std::fmt::Debug for Cache<K, V>
where
    K: Hash + Eq,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let entries = self.entries.lock();
        f.debug_struct("Cache")
            .field("size", &entries.len())
            .field("capacity", &entries.cap())
            .finish()
    }
}
