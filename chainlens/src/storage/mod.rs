//! # Storage Module
//!
//! Every source of blocks, whether a directory of JSON files, an embedded
//! database, or a cache layered over one of those, speaks the same
//! [`BlockStorage`] trait. Wrappers compose freely because they both consume
//! and implement it.
//!
//! ## Architecture
//!
//! ```text
//! memory.rs     — In-memory writable store (tests, scratch caches)
//! fs.rs         — Directory of <height>.json documents + hash index
//! db.rs         — sled-backed durable writable store
//! cached.rs     — Bounded LRU wrapper (height→hash, hash→block)
//! composite.rs  — Primary/secondary fallback over two backends
//! proxy.rs      — Read-through cache: origin + writable cache store
//! ```
//!
//! ## Typical Stack
//!
//! ```text
//!             BlockchainReader
//!                    │
//!            CompositeStorage
//!             ┌──────┴──────────┐
//!   FileSystemStorage     CachedStorage (LRU)
//!                               │
//!                      CachingProxyStorage
//!                        ┌──────┴──────┐
//!                     origin       SledStorage
//! ```
//!
//! ## Contract
//!
//! Single-key lookups return `Ok(None)` on a miss. Only
//! [`BlockStorageExt::block_at_height`], which composes two lookups and needs
//! the first one to hit, turns absence into [`StorageError::HeightNotFound`].

pub mod cached;
pub mod composite;
pub mod db;
pub mod fs;
pub mod memory;
pub mod proxy;

#[cfg(test)]
pub(crate) mod testing;

use async_trait::async_trait;

use crate::block::Block;
use crate::error::{StorageError, StorageResult};

pub use cached::CachedStorage;
pub use composite::CompositeStorage;
pub use db::SledStorage;
pub use fs::FileSystemStorage;
pub use memory::MemoryStorage;
pub use proxy::CachingProxyStorage;

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Read access to the best chain of some block source.
#[async_trait]
pub trait BlockStorage: Send + Sync {
    /// Number of blocks in this backend's view of the best chain. A chain
    /// holding only genesis reports 1.
    async fn block_count(&self) -> StorageResult<u64>;

    /// Hash of the block at `height`, or `None` if this backend has none.
    async fn block_hash(&self, height: u64) -> StorageResult<Option<String>>;

    /// Block with the given hash, or `None` if this backend has none.
    async fn block(&self, hash: &str) -> StorageResult<Option<Block>>;
}

/// Storage that can be durably populated, e.g. as the cache side of a
/// [`CachingProxyStorage`].
#[async_trait]
pub trait WritableBlockStorage: BlockStorage {
    /// Store `block` so later reads by height or hash find it. Writing a
    /// block that is already present overwrites it.
    async fn put_block(&self, block: &Block) -> StorageResult<()>;
}

/// Lookups derived from the [`BlockStorage`] primitives.
///
/// Implemented for every storage through a blanket impl, so backends get
/// these for free and cannot diverge from the composed behavior.
#[async_trait]
pub trait BlockStorageExt: BlockStorage {
    /// `block(block_hash(height))`.
    ///
    /// # Errors
    ///
    /// [`StorageError::HeightNotFound`] when no hash exists at `height`.
    /// Failures of either underlying call propagate unchanged.
    async fn block_at_height(&self, height: u64) -> StorageResult<Option<Block>> {
        let hash = self
            .block_hash(height)
            .await?
            .ok_or(StorageError::HeightNotFound { height })?;
        self.block(&hash).await
    }
}

impl<S: BlockStorage + ?Sized> BlockStorageExt for S {}
