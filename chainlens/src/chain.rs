//! Endpoints of a historical window of blocks.

use crate::block::Block;

/// `(oldest, newest)` pair returned by [`crate::reader::BlockchainReader::subset`].
///
/// Nothing checks that `newest` actually descends from `oldest`; walk
/// `previous()` from `newest` when that matters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chain {
    oldest_block: Block,
    newest_block: Block,
}

impl Chain {
    pub fn new(oldest_block: Block, newest_block: Block) -> Self {
        Chain {
            oldest_block,
            newest_block,
        }
    }

    pub fn oldest_block(&self) -> &Block {
        &self.oldest_block
    }

    pub fn newest_block(&self) -> &Block {
        &self.newest_block
    }

    /// Blocks between the endpoints, inclusive. 0 if the endpoints are
    /// reversed.
    pub fn length(&self) -> u64 {
        (self.newest_block.height() + 1).saturating_sub(self.oldest_block.height())
    }

    /// Seconds between the endpoint timestamps.
    pub fn duration_secs(&self) -> i64 {
        self.newest_block.time() - self.oldest_block.time()
    }

    pub fn into_parts(self) -> (Block, Block) {
        (self.oldest_block, self.newest_block)
    }
}
