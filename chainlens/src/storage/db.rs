//! # SledStorage — Durable Block Store
//!
//! Persistent, writable block storage on sled's embedded key-value store.
//! This is what a [`super::CachingProxyStorage`] writes into when a cache
//! should survive restarts.
//!
//! ## Tree Layout
//!
//! | Tree           | Key                 | Value                    |
//! |----------------|---------------------|--------------------------|
//! | `blocks`       | `height` (8B BE)    | `bincode(BlockHeader)`   |
//! | `block_hashes` | `hash` (UTF-8)      | `height` (8B BE)         |
//!
//! Heights are big-endian so sled's lexicographic order matches numeric
//! order; the last key of `blocks` is the highest stored height.

use std::path::Path;
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use sled::{Db, Tree};
use tracing::debug;

use super::{BlockStorage, WritableBlockStorage};
use crate::block::{Block, BlockHeader};
use crate::error::{StorageError, StorageResult};

/// Block store backed by a sled database.
#[derive(Debug)]
pub struct SledStorage {
    me: Weak<SledStorage>,
    db: Db,
    /// Headers indexed by height (big-endian u64 keys).
    blocks: Tree,
    /// Reverse index: block hash -> height (8 bytes BE).
    block_hashes: Tree,
}

impl SledStorage {
    /// Open or create a database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> StorageResult<Arc<Self>> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// A database that lives in memory and disappears on drop. For tests.
    pub fn open_temporary() -> StorageResult<Arc<Self>> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> StorageResult<Arc<Self>> {
        let blocks = db.open_tree("blocks")?;
        let block_hashes = db.open_tree("block_hashes")?;
        Ok(Arc::new_cyclic(|me| SledStorage {
            me: me.clone(),
            db,
            blocks,
            block_hashes,
        }))
    }

    /// Number of stored blocks (not the same as `block_count` if there are
    /// gaps).
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Force pending writes to disk.
    pub fn flush(&self) -> StorageResult<()> {
        self.db.flush()?;
        Ok(())
    }

    fn header_at(&self, height: u64) -> StorageResult<Option<BlockHeader>> {
        match self.blocks.get(height.to_be_bytes())? {
            Some(bytes) => {
                let header: BlockHeader = bincode::deserialize(&bytes)
                    .map_err(|e| StorageError::Serialization(e.to_string()))?;
                Ok(Some(header))
            }
            None => Ok(None),
        }
    }

    fn attach(&self, header: BlockHeader) -> Block {
        match self.me.upgrade() {
            Some(me) => Block::attached(header, me),
            None => Block::detached(header),
        }
    }
}

fn decode_height(bytes: &[u8]) -> StorageResult<u64> {
    let raw: [u8; 8] = bytes
        .try_into()
        .map_err(|_| StorageError::Serialization("invalid height bytes".to_string()))?;
    Ok(u64::from_be_bytes(raw))
}

#[async_trait]
impl BlockStorage for SledStorage {
    /// Highest stored height + 1, or 0 when empty.
    async fn block_count(&self) -> StorageResult<u64> {
        match self.blocks.last()? {
            Some((key, _)) => Ok(decode_height(&key)? + 1),
            None => Ok(0),
        }
    }

    async fn block_hash(&self, height: u64) -> StorageResult<Option<String>> {
        Ok(self.header_at(height)?.map(|header| header.hash))
    }

    async fn block(&self, hash: &str) -> StorageResult<Option<Block>> {
        let Some(height_bytes) = self.block_hashes.get(hash.as_bytes())? else {
            return Ok(None);
        };
        let height = decode_height(&height_bytes)?;
        Ok(self.header_at(height)?.map(|header| self.attach(header)))
    }
}

#[async_trait]
impl WritableBlockStorage for SledStorage {
    /// Writes the header and the hash index entry. Durability follows
    /// sled's background flush; call [`SledStorage::flush`] to force it.
    async fn put_block(&self, block: &Block) -> StorageResult<()> {
        let height_key = block.height().to_be_bytes();
        let bytes = bincode::serialize(block.header())
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        if let Some(previous) = self.blocks.insert(height_key, bytes)? {
            let previous: BlockHeader = bincode::deserialize(&previous)
                .map_err(|e| StorageError::Serialization(e.to_string()))?;
            if previous.hash != block.hash() {
                self.block_hashes.remove(previous.hash.as_bytes())?;
            }
        }
        self.block_hashes.insert(block.hash().as_bytes(), &height_key[..])?;

        debug!(height = block.height(), hash = block.hash(), "persisted block");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
