//! Test doubles shared by the storage unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::BlockStorage;
use crate::block::{Block, BlockHeader, ChainWork};
use crate::error::{StorageError, StorageResult};

/// `count` linked headers named `hash0..`, with times `t0, t0+step, ...`
/// and chain work equal to `height + 1`.
pub(crate) fn sequential_headers(count: u64, t0: i64, step: i64) -> Vec<BlockHeader> {
    (0..count)
        .map(|height| {
            let previous = if height == 0 {
                String::new()
            } else {
                format!("hash{}", height - 1)
            };
            BlockHeader::new(
                format!("hash{height}"),
                height,
                t0 + step * height as i64,
                previous,
                ChainWork::from(height + 1),
            )
            .expect("valid test header")
        })
        .collect()
}

/// Wraps a storage and counts calls per operation.
pub(crate) struct CountingStorage {
    inner: Arc<dyn BlockStorage>,
    count_calls: AtomicUsize,
    hash_calls: AtomicUsize,
    block_calls: AtomicUsize,
    /// Hashes passed to `block`, in call order.
    pub requested: Mutex<Vec<String>>,
}

impl CountingStorage {
    pub fn new(inner: Arc<dyn BlockStorage>) -> Arc<Self> {
        Arc::new(CountingStorage {
            inner,
            count_calls: AtomicUsize::new(0),
            hash_calls: AtomicUsize::new(0),
            block_calls: AtomicUsize::new(0),
            requested: Mutex::new(Vec::new()),
        })
    }

    pub fn hash_calls(&self) -> usize {
        self.hash_calls.load(Ordering::SeqCst)
    }

    pub fn block_calls(&self) -> usize {
        self.block_calls.load(Ordering::SeqCst)
    }

    pub fn count_calls(&self) -> usize {
        self.count_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BlockStorage for CountingStorage {
    async fn block_count(&self) -> StorageResult<u64> {
        self.count_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.block_count().await
    }

    async fn block_hash(&self, height: u64) -> StorageResult<Option<String>> {
        self.hash_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.block_hash(height).await
    }

    async fn block(&self, hash: &str) -> StorageResult<Option<Block>> {
        self.block_calls.fetch_add(1, Ordering::SeqCst);
        self.requested.lock().push(hash.to_string());
        self.inner.block(hash).await
    }
}

/// Fails every call with a backend error.
pub(crate) struct FailingStorage;

#[async_trait]
impl BlockStorage for FailingStorage {
    async fn block_count(&self) -> StorageResult<u64> {
        Err(StorageError::backend("block_count", "", "backend unavailable"))
    }

    async fn block_hash(&self, height: u64) -> StorageResult<Option<String>> {
        Err(StorageError::backend("block_hash", height, "backend unavailable"))
    }

    async fn block(&self, hash: &str) -> StorageResult<Option<Block>> {
        Err(StorageError::backend("block", hash, "backend unavailable"))
    }
}

/// Answers a fixed count and nothing else.
pub(crate) struct FixedCountStorage(pub u64);

#[async_trait]
impl BlockStorage for FixedCountStorage {
    async fn block_count(&self) -> StorageResult<u64> {
        Ok(self.0)
    }

    async fn block_hash(&self, _height: u64) -> StorageResult<Option<String>> {
        Ok(None)
    }

    async fn block(&self, _hash: &str) -> StorageResult<Option<Block>> {
        Ok(None)
    }
}
