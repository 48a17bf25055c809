//! # Block Model
//!
//! A block here is a *header*: the handful of fields a historical reader
//! needs to navigate a chain and estimate mining effort. Transactions never
//! cross this boundary.
//!
//! ## Layout
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │  Block                                        │
//! │  ├── header: Arc<BlockHeader>                 │
//! │  │   ├── hash: String                         │
//! │  │   ├── height: u64        (genesis = 0)     │
//! │  │   ├── time: i64          (Unix seconds)    │
//! │  │   ├── previous_block_hash: String          │
//! │  │   └── chain_work: ChainWork (BigUint)      │
//! │  └── source: Option<Arc<dyn BlockStorage>>    │
//! │        where previous() is resolved           │
//! └───────────────────────────────────────────────┘
//! ```
//!
//! ## Ancestor Resolution
//!
//! `previous()` asks the block's `source` storage for the parent hash. A
//! caching wrapper that hands out a block re-points `source` at itself via
//! [`Block::relinked`], so walking ancestors keeps hitting the cache. The
//! header is shared behind an `Arc`; relinking never copies field data.

use std::fmt;
use std::sync::Arc;

use num_bigint::BigUint;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::config::MIN_PLAUSIBLE_BLOCK_TIME;
use crate::error::{BlockError, StorageError, StorageResult};
use crate::storage::BlockStorage;

// ---------------------------------------------------------------------------
// ChainWork
// ---------------------------------------------------------------------------

/// Cumulative proof-of-work from genesis up to and including a block.
///
/// Bitcoin-family nodes report this as a big-endian hex string
/// (`"0000…01b5a3f2"`); the value routinely exceeds 128 bits, hence the
/// arbitrary-precision backing integer.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChainWork(BigUint);

impl ChainWork {
    /// Parse a hex string, with or without a `0x` prefix.
    pub fn from_hex(hex: &str) -> Result<Self, BlockError> {
        let digits = hex.trim_start_matches("0x");
        if digits.is_empty() {
            return Ok(Self::default());
        }
        BigUint::parse_bytes(digits.as_bytes(), 16)
            .map(ChainWork)
            .ok_or_else(|| BlockError::InvalidChainWork(hex.to_string()))
    }

    /// Lower-case hex without prefix or leading zeros.
    pub fn to_hex(&self) -> String {
        self.0.to_str_radix(16)
    }

    pub fn as_biguint(&self) -> &BigUint {
        &self.0
    }
}

impl From<BigUint> for ChainWork {
    fn from(value: BigUint) -> Self {
        ChainWork(value)
    }
}

impl From<u64> for ChainWork {
    fn from(value: u64) -> Self {
        ChainWork(BigUint::from(value))
    }
}

impl fmt::Display for ChainWork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self.to_hex())
    }
}

// Hex on the wire keeps JSON documents and bincode records readable by the
// same code path.
impl Serialize for ChainWork {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ChainWork {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let hex = String::deserialize(deserializer)?;
        ChainWork::from_hex(&hex).map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// BlockHeader
// ---------------------------------------------------------------------------

/// The immutable data of a block.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    /// Block hash as reported by the source (hex).
    pub hash: String,
    /// Zero-based position in the chain.
    pub height: u64,
    /// Block timestamp, Unix seconds.
    pub time: i64,
    /// Parent hash. Empty only for genesis.
    pub previous_block_hash: String,
    /// Cumulative work through this block.
    pub chain_work: ChainWork,
}

impl BlockHeader {
    /// Construct a validated header.
    ///
    /// # Errors
    ///
    /// - empty `hash` on a non-genesis block
    /// - `time` before [`MIN_PLAUSIBLE_BLOCK_TIME`]
    /// - empty `previous_block_hash` when `height > 0`
    pub fn new(
        hash: impl Into<String>,
        height: u64,
        time: i64,
        previous_block_hash: impl Into<String>,
        chain_work: ChainWork,
    ) -> Result<Self, BlockError> {
        let header = BlockHeader {
            hash: hash.into(),
            height,
            time,
            previous_block_hash: previous_block_hash.into(),
            chain_work,
        };
        header.validate()?;
        Ok(header)
    }

    /// Re-run the constructor checks, e.g. after deserializing from an
    /// untrusted document.
    pub fn validate(&self) -> Result<(), BlockError> {
        if self.hash.is_empty() && self.height > 0 {
            return Err(BlockError::EmptyHash {
                height: self.height,
            });
        }
        if self.time < MIN_PLAUSIBLE_BLOCK_TIME {
            return Err(BlockError::ImplausibleTime {
                hash: self.hash.clone(),
                time: self.time,
            });
        }
        if self.previous_block_hash.is_empty() && self.height > 0 {
            return Err(BlockError::MissingPreviousHash {
                hash: self.hash.clone(),
                height: self.height,
            });
        }
        Ok(())
    }

    pub fn is_genesis(&self) -> bool {
        self.height == 0
    }
}

// ---------------------------------------------------------------------------
// Block
// ---------------------------------------------------------------------------

/// A header bound to the storage that resolves its ancestors.
///
/// Cloning is cheap: both the header and the storage handle are shared.
#[derive(Clone)]
pub struct Block {
    header: Arc<BlockHeader>,
    source: Option<Arc<dyn BlockStorage>>,
}

impl Block {
    /// A block with no storage attached. `previous()` on it fails with
    /// [`StorageError::Detached`] unless it is genesis.
    pub fn detached(header: BlockHeader) -> Self {
        Block {
            header: Arc::new(header),
            source: None,
        }
    }

    /// A block whose ancestors resolve through `source`.
    pub fn attached(header: BlockHeader, source: Arc<dyn BlockStorage>) -> Self {
        Block {
            header: Arc::new(header),
            source: Some(source),
        }
    }

    /// Same header, ancestors resolved through `source` instead.
    pub fn relinked(&self, source: Arc<dyn BlockStorage>) -> Self {
        Block {
            header: Arc::clone(&self.header),
            source: Some(source),
        }
    }

    /// Fetch the parent block from the owning storage.
    ///
    /// Genesis (or any block without a parent hash) yields `Ok(None)`, not
    /// an error.
    pub async fn previous(&self) -> StorageResult<Option<Block>> {
        if self.header.is_genesis() || self.header.previous_block_hash.is_empty() {
            return Ok(None);
        }
        match &self.source {
            Some(source) => source.block(&self.header.previous_block_hash).await,
            None => Err(StorageError::Detached {
                hash: self.header.hash.clone(),
            }),
        }
    }

    pub fn header(&self) -> &BlockHeader {
        &self.header
    }

    pub fn hash(&self) -> &str {
        &self.header.hash
    }

    pub fn height(&self) -> u64 {
        self.header.height
    }

    pub fn time(&self) -> i64 {
        self.header.time
    }

    pub fn previous_block_hash(&self) -> &str {
        &self.header.previous_block_hash
    }

    pub fn chain_work(&self) -> &ChainWork {
        &self.header.chain_work
    }

    /// Whether `previous()` has a storage to consult.
    pub fn is_attached(&self) -> bool {
        self.source.is_some()
    }
}

impl PartialEq for Block {
    fn eq(&self, other: &Self) -> bool {
        self.header == other.header
    }
}

impl Eq for Block {}

impl fmt::Debug for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Block")
            .field("header", &self.header)
            .field("attached", &self.source.is_some())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
