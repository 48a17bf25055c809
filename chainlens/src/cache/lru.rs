//! # Bounded LRU Cache
//!
//! A thin layer over [`lru::LruCache`] adding the rules every cache in
//! chainlens follows:
//!
//! - capacity is at least [`MIN_LRU_SIZE`], checked at construction and
//!   reported as a [`ConfigError`] instead of a panic;
//! - a loader answering `None` caches nothing and evicts nothing.
//!
//! ```text
//!  most recent                                   least recent
//!     │                                                │
//!     ▼                                                ▼
//!   k=7 ─── k=3 ─── k=9 ─── k=1      insert(k=4) ──► k=1 evicted
//! ```
//!
//! With two or more slots the entry just inserted is never the one
//! evicted.

use std::fmt;
use std::hash::Hash;
use std::num::NonZeroUsize;

use crate::config::MIN_LRU_SIZE;
use crate::error::ConfigError;

/// Least-recently-used cache with a fixed capacity.
pub struct LruCache<K, V> {
    inner: lru::LruCache<K, V>,
}

impl<K, V> LruCache<K, V>
where
    K: Hash + Eq + Clone,
{
    /// Create an empty cache holding at most `max_size` entries.
    ///
    /// # Errors
    ///
    /// [`ConfigError::CacheTooSmall`] when `max_size < 2`.
    pub fn new(max_size: usize) -> Result<Self, ConfigError> {
        let capacity = NonZeroUsize::new(max_size)
            .filter(|cap| cap.get() >= MIN_LRU_SIZE)
            .ok_or(ConfigError::CacheTooSmall { max_size })?;
        Ok(Self {
            inner: lru::LruCache::new(capacity),
        })
    }

    pub fn max_size(&self) -> usize {
        self.inner.cap().get()
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Whether `key` is cached. Does not count as an access.
    pub fn contains(&self, key: &K) -> bool {
        self.inner.contains(key)
    }

    /// Look up `key`, promoting it to most-recently-used on a hit.
    pub fn get(&mut self, key: &K) -> Option<&V> {
        self.inner.get(key)
    }

    /// Look up `key` without touching its recency.
    pub fn peek(&self, key: &K) -> Option<&V> {
        self.inner.peek(key)
    }

    /// Insert or replace `key` as the most-recently-used entry, evicting
    /// the least-recently-used one if the cache is full.
    pub fn insert(&mut self, key: K, value: V) {
        self.inner.put(key, value);
    }

    /// Remove `key` if present, returning its value.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.inner.pop(key)
    }

    /// Get-or-populate: return the cached value for `key`, or call `loader`
    /// and cache its result.
    ///
    /// A `None` from the loader is returned without being cached, so a later
    /// call retries the load instead of replaying a stale miss.
    pub fn get_or_load<F>(&mut self, key: &K, loader: F) -> Option<V>
    where
        V: Clone,
        F: FnOnce(&K) -> Option<V>,
    {
        if let Some(value) = self.get(key) {
            return Some(value.clone());
        }
        let value = loader(key)?;
        self.insert(key.clone(), value.clone());
        Some(value)
    }

    /// Keys from most- to least-recently used.
    pub fn keys(&self) -> impl Iterator<Item = &K> + '_ {
        self.inner.iter().map(|(key, _)| key)
    }
}

impl<K: Hash + Eq, V> fmt::Debug for LruCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LruCache")
            .field("len", &self.inner.len())
            .field("max_size", &self.inner.cap())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn keys(cache: &LruCache<u32, String>) -> Vec<u32> {
        cache.keys().copied().collect()
    }

    #[test]
    fn rejects_capacity_below_two() {
        assert_eq!(
            LruCache::<u32, u32>::new(1).unwrap_err(),
            ConfigError::CacheTooSmall { max_size: 1 }
        );
        assert!(LruCache::<u32, u32>::new(0).is_err());
        assert_eq!(LruCache::<u32, u32>::new(2).unwrap().max_size(), 2);
    }

    #[test]
    fn evicts_least_recently_used() {
        let mut cache = LruCache::new(3).unwrap();
        for k in 1..=3 {
            cache.insert(k, k.to_string());
        }
        // Touch 1 so 2 becomes the eviction candidate.
        assert!(cache.get(&1).is_some());
        cache.insert(4, "4".to_string());

        assert_eq!(cache.len(), 3);
        assert!(!cache.contains(&2));
        assert_eq!(keys(&cache), vec![4, 1, 3]);
    }

    #[test]
    fn overflow_by_one_drops_oldest_miss() {
        let loads = Cell::new(0);
        let mut cache: LruCache<u32, String> = LruCache::new(4).unwrap();
        let load = |k: u32, cache: &mut LruCache<u32, String>| {
            cache.get_or_load(&k, |k| {
                loads.set(loads.get() + 1);
                Some(format!("v{k}"))
            })
        };

        for k in 0..5 {
            load(k, &mut cache);
        }
        assert_eq!(cache.len(), 4);
        assert_eq!(loads.get(), 5);

        // Key 0 was least recently used and must be reloaded.
        load(0, &mut cache);
        assert_eq!(loads.get(), 6);
    }

    #[test]
    fn hit_does_not_call_loader() {
        let mut cache = LruCache::new(2).unwrap();
        assert_eq!(cache.get_or_load(&"a", |_| Some(1)), Some(1));
        // The loader now answers differently; the cached value wins.
        assert_eq!(cache.get_or_load(&"a", |_| Some(2)), Some(1));
        assert_eq!(cache.get_or_load(&"a", |_| panic!("loader called on hit")), Some(1));
    }

    #[test]
    fn none_is_not_cached() {
        let calls = Cell::new(0);
        let mut cache: LruCache<&str, u32> = LruCache::new(2).unwrap();
        let miss = |_: &&str| {
            calls.set(calls.get() + 1);
            None
        };
        assert_eq!(cache.get_or_load(&"a", miss), None);
        assert_eq!(cache.get_or_load(&"a", miss), None);
        assert_eq!(calls.get(), 2);
        assert!(cache.is_empty());

        assert_eq!(cache.get_or_load(&"a", |_| Some(9)), Some(9));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn miss_on_full_cache_keeps_every_entry() {
        let mut cache: LruCache<u32, String> = LruCache::new(2).unwrap();
        cache.insert(1, "1".to_string());
        cache.insert(2, "2".to_string());

        assert_eq!(cache.get_or_load(&500, |_| None), None);
        assert_eq!(cache.len(), 2);
        assert!(cache.contains(&1) && cache.contains(&2));
    }

    #[test]
    fn insert_existing_key_replaces_and_promotes() {
        let mut cache = LruCache::new(2).unwrap();
        cache.insert(1, "one".to_string());
        cache.insert(2, "two".to_string());
        cache.insert(1, "uno".to_string());
        assert_eq!(keys(&cache), vec![1, 2]);
        assert_eq!(cache.peek(&1).map(String::as_str), Some("uno"));
    }

    #[test]
    fn remove_frees_capacity() {
        let mut cache = LruCache::new(3).unwrap();
        for k in 1..=3 {
            cache.insert(k, k.to_string());
        }
        assert_eq!(cache.remove(&2), Some("2".to_string()));
        assert_eq!(cache.remove(&2), None);
        assert_eq!(keys(&cache), vec![3, 1]);

        cache.insert(5, "5".to_string());
        assert_eq!(keys(&cache), vec![5, 3, 1]);
    }

    #[test]
    fn newest_entry_survives_churn() {
        let mut cache = LruCache::new(5).unwrap();
        for round in 0..200u32 {
            let key = (round * 7) % 11;
            cache.get_or_load(&key, |k| Some(k.to_string()));
            assert!(cache.len() <= 5);
            assert_eq!(cache.keys().next(), Some(&key));
        }
    }
}
