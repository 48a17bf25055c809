//! Async get-or-populate cache on top of [`LruCache`].
//!
//! A miss starts a load and parks it as a *shared future* in a pending
//! table beside the LRU; every concurrent caller for that key clones and
//! awaits the same future. At most one load per key is in flight.
//!
//! ```text
//!   get(k) ──► values (LRU) ── hit ──► return
//!                 │
//!                miss
//!                 ▼
//!           pending[k] ── present ──► await shared load
//!                 │
//!               absent ──► start load, pending[k] = load ──► await
//!
//!   load resolves ──► remove pending[k]
//!                     Some(v) ──► values.insert(k, v)   (may evict)
//!                     None / Err ──► nothing cached, nothing evicted
//! ```

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use tracing::debug;

use super::lru::LruCache;
use crate::error::{ConfigError, StorageError, StorageResult};

type SharedLoad<V> = Shared<BoxFuture<'static, Result<Option<V>, Arc<StorageError>>>>;

/// Produces the value for a missing key.
pub type Loader<K, V> = Arc<dyn Fn(K) -> BoxFuture<'static, StorageResult<Option<V>>> + Send + Sync>;

struct State<K, V> {
    /// Resolved values. Only loads that found something land here.
    values: LruCache<K, V>,
    /// Loads still in flight.
    pending: HashMap<K, SharedLoad<V>>,
}

/// Bounded, async, read-through cache keyed by `K`.
pub struct LoadingCache<K, V> {
    state: Mutex<State<K, V>>,
    loader: Loader<K, V>,
}

impl<K, V> LoadingCache<K, V>
where
    K: Hash + Eq + Clone + fmt::Debug + Send + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// # Errors
    ///
    /// [`ConfigError::CacheTooSmall`] when `max_size < 2`.
    pub fn new(max_size: usize, loader: Loader<K, V>) -> Result<Self, ConfigError> {
        Ok(Self {
            state: Mutex::new(State {
                values: LruCache::new(max_size)?,
                pending: HashMap::new(),
            }),
            loader,
        })
    }

    /// Convenience constructor taking any async closure as the loader.
    pub fn from_fn<F, Fut>(max_size: usize, loader: F) -> Result<Self, ConfigError>
    where
        F: Fn(K) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = StorageResult<Option<V>>> + Send + 'static,
    {
        Self::new(max_size, Arc::new(move |key| loader(key).boxed()))
    }

    /// Return the value for `key`, loading it on a miss.
    ///
    /// Hits promote the entry to most-recently-used and never touch the
    /// loader.
    pub async fn get(&self, key: K) -> StorageResult<Option<V>> {
        let load = {
            let mut state = self.state.lock();
            if let Some(value) = state.values.get(&key) {
                return Ok(Some(value.clone()));
            }
            match state.pending.get(&key) {
                Some(load) => load.clone(),
                None => {
                    debug!(?key, "cache miss");
                    let load = (self.loader)(key.clone())
                        .map(|result| result.map_err(Arc::new))
                        .boxed()
                        .shared();
                    state.pending.insert(key.clone(), load.clone());
                    load
                }
            }
        };

        let outcome = load.clone().await;
        self.settle(key, &load, &outcome);
        outcome.map_err(StorageError::Shared)
    }

    /// Retire `load` from the pending table and keep its value if it found
    /// one. Only the first waiter to get here does anything; a newer load
    /// for the same key is left alone.
    fn settle(&self, key: K, load: &SharedLoad<V>, outcome: &Result<Option<V>, Arc<StorageError>>) {
        let mut state = self.state.lock();
        let current = state
            .pending
            .get(&key)
            .is_some_and(|pending| pending.ptr_eq(load));
        if !current {
            return;
        }
        state.pending.remove(&key);
        if let Ok(Some(value)) = outcome {
            state.values.insert(key, value.clone());
        }
    }

    /// Number of cached values. Loads in flight are not counted.
    pub fn size(&self) -> usize {
        self.state.lock().values.len()
    }

    pub fn max_size(&self) -> usize {
        self.state.lock().values.max_size()
    }

    /// Whether `key` currently has a cached value. Not an access.
    pub fn contains(&self, key: &K) -> bool {
        self.state.lock().values.contains(key)
    }
}

impl<K, V> fmt::Debug for LoadingCache<K, V>
where
    K: Hash + Eq + Clone,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("LoadingCache")
            .field("size", &state.values.len())
            .field("max_size", &state.values.max_size())
            .field("in_flight", &state.pending.len())
            .finish()
    }
}
