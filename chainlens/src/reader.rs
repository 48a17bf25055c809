//! # Blockchain Reader
//!
//! Chain-level navigation on top of any [`BlockStorage`]: the current tip,
//! one step back, and time-based lookup.
//!
//! ## Time Search
//!
//! Block times are assumed non-decreasing with height, so a binary search
//! over `[0, count - 1]` keyed on `time` finds a block for a timestamp in
//! O(log n) storage reads. Reads run one after another; each midpoint
//! depends on the previous answer.
//!
//! ```text
//!   heights:  0     1     2     3     4
//!   times:  1000  1150  1300  1450  1600
//!
//!   search(1300) ──► height 2  (exact)
//!   search(1400) ──► height 2  (floor: latest block before 1400)
//!   search( 900) ──► height 0  (before genesis)
//!   search(9999) ──► height 4  (after the tip)
//! ```
//!
//! A height inside `[0, count - 1]` that comes back empty means the
//! backend contradicts its own count. That is reported as
//! [`StorageError::Inconsistent`] rather than papered over.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, Instrument, Span};

use crate::block::Block;
use crate::chain::Chain;
use crate::error::{StorageError, StorageResult};
use crate::storage::{BlockStorage, BlockStorageExt};

/// Read-only facade over one storage backend.
pub struct BlockchainReader {
    storage: Arc<dyn BlockStorage>,
    span: Span,
}

impl BlockchainReader {
    pub fn new(storage: Arc<dyn BlockStorage>) -> Self {
        BlockchainReader {
            storage,
            span: tracing::debug_span!("blockchain_reader"),
        }
    }

    /// Emit this component's events inside `span`.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn storage(&self) -> &Arc<dyn BlockStorage> {
        &self.storage
    }

    /// The block at height `count - 1`.
    ///
    /// # Errors
    ///
    /// [`StorageError::EmptyChain`] when the storage reports zero blocks,
    /// [`StorageError::Inconsistent`] when the tip height has no block.
    pub async fn newest_block(&self) -> StorageResult<Block> {
        let count = self.storage.block_count().await?;
        if count == 0 {
            return Err(StorageError::EmptyChain);
        }
        let block = self.block_in_range(count - 1, count).await?;
        self.span
            .in_scope(|| debug!(height = block.height(), hash = block.hash(), "newest block"));
        Ok(block)
    }

    /// Parent of `block`, looked up in this reader's storage (not the
    /// block's own source). `Ok(None)` for a block without a parent hash.
    pub async fn previous(&self, block: &Block) -> StorageResult<Option<Block>> {
        if block.previous_block_hash().is_empty() {
            return Ok(None);
        }
        self.storage.block(block.previous_block_hash()).await
    }

    /// Block whose time equals `target` (Unix seconds) if the search visits
    /// one; otherwise the latest visited block older than `target`, or
    /// genesis when every block is newer.
    ///
    /// # Errors
    ///
    /// [`StorageError::EmptyChain`] on an empty storage and
    /// [`StorageError::Inconsistent`] when a height below the count is
    /// missing.
    pub async fn search(&self, target: i64) -> StorageResult<Block> {
        self.search_inner(target)
            .instrument(self.span.clone())
            .await
    }

    async fn search_inner(&self, target: i64) -> StorageResult<Block> {
        let count = self.storage.block_count().await?;
        if count == 0 {
            return Err(StorageError::EmptyChain);
        }

        let mut low = 0u64;
        let mut high = count - 1;
        let mut floor: Option<Block> = None;
        let mut later: Option<Block> = None;
        let mut steps = 0u32;

        loop {
            let mid = low + (high - low) / 2;
            let block = self.block_in_range(mid, count).await?;
            steps += 1;

            if block.time() == target {
                debug!(target_time = target, height = mid, steps, "exact match");
                return Ok(block);
            }
            if block.time() < target {
                floor = Some(block);
                if mid == high {
                    break;
                }
                low = mid + 1;
            } else {
                later = Some(block);
                if mid == low {
                    break;
                }
                high = mid - 1;
            }
        }

        // At least one step ran, so one of the two is set.
        let found = floor.or(later).ok_or_else(|| {
            StorageError::Inconsistent(format!("search for {target} visited no blocks"))
        })?;
        debug!(target_time = target, height = found.height(), steps, "nearest match");
        Ok(found)
    }

    /// [`search`](Self::search) both endpoints and pair the results.
    pub async fn subset(
        &self,
        oldest: DateTime<Utc>,
        newest: DateTime<Utc>,
    ) -> StorageResult<Chain> {
        let oldest_block = self.search(oldest.timestamp()).await?;
        let newest_block = self.search(newest.timestamp()).await?;
        Ok(Chain::new(oldest_block, newest_block))
    }

    /// Fetch a height the storage's own count says exists.
    async fn block_in_range(&self, height: u64, count: u64) -> StorageResult<Block> {
        let missing = || {
            StorageError::Inconsistent(format!(
                "storage reports {count} blocks but height {height} is missing"
            ))
        };
        match self.storage.block_at_height(height).await {
            Ok(Some(block)) => Ok(block),
            Ok(None) | Err(StorageError::HeightNotFound { .. }) => Err(missing()),
            Err(error) => Err(error),
        }
    }
}
