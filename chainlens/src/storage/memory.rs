//! In-memory writable block store.
//!
//! Holds headers in two maps (height → header, hash → height). Useful as the
//! cache side of a [`super::CachingProxyStorage`] when durability is not
//! needed, and as the backing store in tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{BlockStorage, WritableBlockStorage};
use crate::block::{Block, BlockHeader};
use crate::error::StorageResult;

#[derive(Debug, Default)]
struct Maps {
    by_height: BTreeMap<u64, BlockHeader>,
    by_hash: HashMap<String, u64>,
}

/// Blocks held in process memory. Returned blocks resolve `previous()`
/// through this store.
#[derive(Debug)]
pub struct MemoryStorage {
    me: Weak<MemoryStorage>,
    maps: RwLock<Maps>,
}

impl MemoryStorage {
    pub fn new() -> Arc<Self> {
        Arc::new_cyclic(|me| MemoryStorage {
            me: me.clone(),
            maps: RwLock::new(Maps::default()),
        })
    }

    /// A store pre-populated with `headers`.
    pub fn with_headers(headers: impl IntoIterator<Item = BlockHeader>) -> Arc<Self> {
        let storage = Self::new();
        for header in headers {
            storage.insert(header);
        }
        storage
    }

    /// Synchronous insert. Replaces any block already stored at the same
    /// height, including its hash index entry.
    pub fn insert(&self, header: BlockHeader) {
        let mut maps = self.maps.write();
        if let Some(old) = maps.by_height.get(&header.height) {
            let old_hash = old.hash.clone();
            maps.by_hash.remove(&old_hash);
        }
        maps.by_hash.insert(header.hash.clone(), header.height);
        maps.by_height.insert(header.height, header);
    }

    /// Number of stored blocks.
    pub fn len(&self) -> usize {
        self.maps.read().by_height.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn attach(&self, header: BlockHeader) -> Block {
        match self.me.upgrade() {
            Some(me) => Block::attached(header, me),
            None => Block::detached(header),
        }
    }
}

#[async_trait]
impl BlockStorage for MemoryStorage {
    async fn block_count(&self) -> StorageResult<u64> {
        Ok(self.len() as u64)
    }

    async fn block_hash(&self, height: u64) -> StorageResult<Option<String>> {
        Ok(self
            .maps
            .read()
            .by_height
            .get(&height)
            .map(|header| header.hash.clone()))
    }

    async fn block(&self, hash: &str) -> StorageResult<Option<Block>> {
        let header = {
            let maps = self.maps.read();
            maps.by_hash
                .get(hash)
                .and_then(|height| maps.by_height.get(height))
                .cloned()
        };
        Ok(header.map(|header| self.attach(header)))
    }
}

#[async_trait]
impl WritableBlockStorage for MemoryStorage {
    async fn put_block(&self, block: &Block) -> StorageResult<()> {
        self.insert(block.header().clone());
        Ok(())
    }
}
