//! # Caching Proxy Storage
//!
//! Read-through cache with a durable backing store. Reads check the cache
//! store first; a miss goes to the origin and, if the origin has the block,
//! writes it into the cache store before returning.
//!
//! ```text
//!   block(hash) ──► cache.block(hash) ── hit ──► return
//!                          │
//!                         miss
//!                          ▼
//!                   origin.block(hash) ── found ──► cache.put_block ──► return
//!                          │
//!                        absent ──► None (nothing written)
//! ```
//!
//! Unlike [`super::CachedStorage`] there is no eviction: the cache store
//! grows without bound and is meant to be inspected and managed by the
//! operator (a sled database, a block directory). Errors from either side
//! propagate. Two readers racing on one cold key may both write it; writes
//! are idempotent overwrites.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, Span};

use super::{BlockStorage, BlockStorageExt, WritableBlockStorage};
use crate::block::Block;
use crate::error::{StorageError, StorageResult};

/// Origin plus writable cache store.
pub struct CachingProxyStorage {
    origin: Arc<dyn BlockStorage>,
    cache: Arc<dyn WritableBlockStorage>,
    span: Span,
}

impl CachingProxyStorage {
    pub fn new(origin: Arc<dyn BlockStorage>, cache: Arc<dyn WritableBlockStorage>) -> Self {
        CachingProxyStorage {
            origin,
            cache,
            span: tracing::debug_span!("caching_proxy_storage"),
        }
    }

    /// Emit this component's events inside `span`.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn cache(&self) -> &Arc<dyn WritableBlockStorage> {
        &self.cache
    }

    async fn remember(&self, block: &Block) -> StorageResult<()> {
        self.cache.put_block(block).await?;
        self.span
            .in_scope(|| debug!(height = block.height(), hash = block.hash(), "cached block"));
        Ok(())
    }
}

#[async_trait]
impl BlockStorage for CachingProxyStorage {
    /// Always the origin's count; the cache only knows what it has seen.
    async fn block_count(&self) -> StorageResult<u64> {
        self.origin.block_count().await
    }

    async fn block_hash(&self, height: u64) -> StorageResult<Option<String>> {
        if let Some(hash) = self.cache.block_hash(height).await? {
            self.span.in_scope(|| debug!(height, "block_hash: cache hit"));
            return Ok(Some(hash));
        }
        self.span.in_scope(|| debug!(height, "block_hash: cache miss"));

        let block = match self.origin.block_at_height(height).await {
            Ok(block) => block,
            Err(StorageError::HeightNotFound { .. }) => None,
            Err(error) => return Err(error),
        };
        match block {
            Some(block) => {
                self.remember(&block).await?;
                Ok(Some(block.hash().to_string()))
            }
            None => {
                self.span.in_scope(|| info!(height, "block_hash: no block at height"));
                Ok(None)
            }
        }
    }

    async fn block(&self, hash: &str) -> StorageResult<Option<Block>> {
        if let Some(block) = self.cache.block(hash).await? {
            self.span.in_scope(|| debug!(hash, "block: cache hit"));
            return Ok(Some(block));
        }
        self.span.in_scope(|| debug!(hash, "block: cache miss"));

        match self.origin.block(hash).await? {
            Some(block) => {
                self.remember(&block).await?;
                Ok(Some(block))
            }
            None => {
                self.span.in_scope(|| info!(hash, "block: no block for hash"));
                Ok(None)
            }
        }
    }
}
