//! # LRU-Cached Storage
//!
//! Wraps one "real" backend with two bounded caches:
//!
//! ```text
//!   block_hash(h) ──► LoadingCache<u64, String>   ──miss──► real.block_hash(h)
//!   block(hash)   ──► LoadingCache<String, Block> ──miss──► real.block(hash)
//!   block_count() ───────────────────────────────────────► real.block_count()
//! ```
//!
//! The count is never cached: it moves with the chain tip.
//!
//! Blocks handed out are relinked to this wrapper, so `previous()` on them
//! goes through the cache too. Cached entries keep their link to the real
//! backend; relinking happens on the way out, which keeps the wrapper from
//! holding strong references to itself.

use std::sync::{Arc, Weak};

use async_trait::async_trait;
use tracing::{debug, Instrument, Span};

use super::BlockStorage;
use crate::block::Block;
use crate::cache::LoadingCache;
use crate::config::CacheConfig;
use crate::error::{ConfigError, StorageResult};

/// Bounded in-memory cache in front of a single backend.
pub struct CachedStorage {
    me: Weak<CachedStorage>,
    real: Arc<dyn BlockStorage>,
    hashes: LoadingCache<u64, String>,
    blocks: LoadingCache<String, Block>,
    span: Span,
}

impl CachedStorage {
    /// Cache up to `max_entries` hashes and as many blocks.
    ///
    /// # Errors
    ///
    /// [`ConfigError::CacheTooSmall`] when `max_entries < 2`.
    pub fn new(real: Arc<dyn BlockStorage>, max_entries: usize) -> Result<Arc<Self>, ConfigError> {
        Self::instrumented(real, max_entries, tracing::debug_span!("cached_storage"))
    }

    /// Size the caches from a time window.
    pub fn with_config(
        real: Arc<dyn BlockStorage>,
        config: &CacheConfig,
    ) -> Result<Arc<Self>, ConfigError> {
        Self::new(real, config.max_entries())
    }

    /// Like [`CachedStorage::new`], emitting events inside `span`.
    pub fn instrumented(
        real: Arc<dyn BlockStorage>,
        max_entries: usize,
        span: Span,
    ) -> Result<Arc<Self>, ConfigError> {
        let hash_source = Arc::clone(&real);
        let hashes = LoadingCache::from_fn(max_entries, move |height: u64| {
            let real = Arc::clone(&hash_source);
            async move { real.block_hash(height).await }
        })?;

        let block_source = Arc::clone(&real);
        let blocks = LoadingCache::from_fn(max_entries, move |hash: String| {
            let real = Arc::clone(&block_source);
            async move { real.block(&hash).await }
        })?;

        Ok(Arc::new_cyclic(|me| CachedStorage {
            me: me.clone(),
            real,
            hashes,
            blocks,
            span,
        }))
    }

    /// Entry count of the fuller of the two caches.
    pub fn size(&self) -> usize {
        self.hashes.size().max(self.blocks.size())
    }

    pub fn max_entries(&self) -> usize {
        self.hashes.max_size()
    }
}

#[async_trait]
impl BlockStorage for CachedStorage {
    async fn block_count(&self) -> StorageResult<u64> {
        self.real.block_count().await
    }

    async fn block_hash(&self, height: u64) -> StorageResult<Option<String>> {
        self.hashes
            .get(height)
            .instrument(self.span.clone())
            .await
    }

    async fn block(&self, hash: &str) -> StorageResult<Option<Block>> {
        let block = self
            .blocks
            .get(hash.to_string())
            .instrument(self.span.clone())
            .await?;

        let Some(block) = block else {
            self.span.in_scope(|| debug!(hash, "block not found"));
            return Ok(None);
        };
        Ok(Some(match self.me.upgrade() {
            Some(me) => block.relinked(me),
            None => block,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorageError;
    use crate::storage::testing::{sequential_headers, CountingStorage, FailingStorage};
    use crate::storage::{BlockStorageExt, MemoryStorage};

    fn setup(max_entries: usize) -> (Arc<CountingStorage>, Arc<CachedStorage>) {
        let memory = MemoryStorage::with_headers(sequential_headers(10, 1_500_000_000, 150));
        let real = CountingStorage::new(memory);
        let cached = CachedStorage::new(real.clone(), max_entries).unwrap();
        (real, cached)
    }

    #[test]
    fn rejects_tiny_cache() {
        let memory = MemoryStorage::new();
        assert!(matches!(
            CachedStorage::new(memory, 1),
            Err(ConfigError::CacheTooSmall { max_size: 1 })
        ));
    }

    #[test]
    fn default_config_sizes_for_thirty_days() {
        let cached = CachedStorage::with_config(MemoryStorage::new(), &CacheConfig::default()).unwrap();
        assert_eq!(cached.max_entries(), 17_280);
    }

    #[tokio::test]
    async fn block_count_is_never_cached() {
        let (real, cached) = setup(4);
        assert_eq!(cached.block_count().await.unwrap(), 10);
        assert_eq!(cached.block_count().await.unwrap(), 10);
        assert_eq!(real.count_calls(), 2);
    }

    #[tokio::test]
    async fn block_hash_hits_real_backend_once() {
        let (real, cached) = setup(4);
        for _ in 0..3 {
            assert_eq!(cached.block_hash(5).await.unwrap().as_deref(), Some("hash5"));
        }
        assert_eq!(real.hash_calls(), 1);
    }

    #[tokio::test]
    async fn returned_blocks_walk_ancestors_through_cache() {
        let (real, cached) = setup(8);

        let tip = cached.block("hash3").await.unwrap().expect("block");
        let first = tip.previous().await.unwrap().expect("parent");
        let second = tip.previous().await.unwrap().expect("parent");
        assert_eq!(first.hash(), "hash2");
        assert_eq!(first, second);

        let fetched: Vec<String> = real.requested.lock().clone();
        assert_eq!(fetched, vec!["hash3".to_string(), "hash2".to_string()]);
    }

    #[tokio::test]
    async fn ancestors_of_ancestors_stay_on_the_cache() {
        let (real, cached) = setup(8);
        let tip = cached.block_at_height(4).await.unwrap().expect("block");
        let grandparent = tip
            .previous()
            .await
            .unwrap()
            .expect("parent")
            .previous()
            .await
            .unwrap()
            .expect("grandparent");
        assert_eq!(grandparent.height(), 2);

        // Walk again: everything is cached now.
        let calls_before = real.block_calls();
        let again = tip.previous().await.unwrap().expect("parent");
        again.previous().await.unwrap().expect("grandparent");
        assert_eq!(real.block_calls(), calls_before);
    }

    #[tokio::test]
    async fn missing_block_stays_absent() {
        let (real, cached) = setup(4);
        assert!(cached.block("nope").await.unwrap().is_none());
        assert!(cached.block("nope").await.unwrap().is_none());
        // Misses are not cached.
        assert_eq!(real.block_calls(), 2);
    }

    #[tokio::test]
    async fn size_reports_fuller_cache() {
        let (_real, cached) = setup(8);
        cached.block_hash(0).await.unwrap();
        cached.block_hash(1).await.unwrap();
        cached.block_hash(2).await.unwrap();
        cached.block("hash0").await.unwrap();
        assert_eq!(cached.size(), 3);
    }

    #[tokio::test]
    async fn backend_failures_propagate() {
        let cached = CachedStorage::new(Arc::new(FailingStorage), 4).unwrap();
        let err = cached.block_hash(1).await.unwrap_err();
        assert!(matches!(err.root(), StorageError::Backend { operation: "block_hash", .. }));
        assert!(cached.block_count().await.is_err());
    }
}
