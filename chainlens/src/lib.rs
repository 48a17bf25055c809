// Copyright (c) 2026 Chainlens Contributors. MIT License.
// See LICENSE for details.

//! # Chainlens — Core Library
//!
//! Read-only access to the history of a proof-of-work chain, one block
//! header at a time. Headers come from wherever they happen to live (a
//! directory of JSON dumps, an embedded database, a slower mirror) and
//! chainlens stacks caches and fallbacks on top until "give me the block
//! from last Tuesday" is cheap.
//!
//! ## Architecture
//!
//! - **block** — `BlockHeader`, `ChainWork`, and the storage-bound `Block`.
//! - **storage** — The `BlockStorage` trait and every backend and wrapper.
//! - **cache** — Arena LRU plus the async single-flight loading cache.
//! - **reader** — Tip lookup, ancestor steps, and binary search by time.
//! - **chain** — `(oldest, newest)` result of a time-range query.
//! - **config** — Constants and cache sizing.
//! - **error** — Error types shared by all of the above.
//!
//! ## Ground Rules
//!
//! 1. A miss is `Ok(None)`. Errors are for things that actually broke.
//! 2. Nothing here validates consensus. Sources are trusted to hand us the
//!    best chain; we only reject data that is obviously malformed.
//! 3. Every layer is a `BlockStorage`, so layers compose in any order.

pub mod block;
pub mod cache;
pub mod chain;
pub mod config;
pub mod error;
pub mod reader;
pub mod storage;

pub use block::{Block, BlockHeader, ChainWork};
pub use chain::Chain;
pub use config::CacheConfig;
pub use error::{BlockError, ConfigError, StorageError, StorageResult};
pub use reader::BlockchainReader;
pub use storage::{
    BlockStorage, BlockStorageExt, CachedStorage, CachingProxyStorage, CompositeStorage,
    FileSystemStorage, MemoryStorage, SledStorage, WritableBlockStorage,
};
