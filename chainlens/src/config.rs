//! # Constants & Cache Configuration
//!
//! Every tunable number in chainlens lives here. Block intervals, cache
//! windows, the oldest timestamp we are willing to believe: if a module needs
//! one of these, it imports it from this file instead of hardcoding it.

use std::time::Duration;

// ---------------------------------------------------------------------------
// Chain Timing
// ---------------------------------------------------------------------------

/// Assumed average spacing between blocks. 150 seconds is the ZCash target
/// interval; Bitcoin's 600 s would size caches four times smaller.
pub const DEFAULT_BLOCK_INTERVAL: Duration = Duration::from_secs(150);

/// How much chain history the in-memory block cache should be able to hold
/// before it starts evicting.
pub const DEFAULT_CACHE_WINDOW: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Oldest block timestamp (Unix seconds) considered plausible:
/// 2000-02-01T00:00:00Z. No public blockchain launched before this, so an
/// earlier value means the source handed us garbage (or milliseconds).
pub const MIN_PLAUSIBLE_BLOCK_TIME: i64 = 949_363_200;

// ---------------------------------------------------------------------------
// Cache Limits
// ---------------------------------------------------------------------------

/// Smallest LRU capacity we accept. With a single slot the most- and
/// least-recently-used entry are the same entry and eviction degenerates.
pub const MIN_LRU_SIZE: usize = 2;

// ---------------------------------------------------------------------------
// On-Disk Layout
// ---------------------------------------------------------------------------

/// Subdirectory of a block directory mapping `<hash>` files to heights.
pub const HASH_INDEX_DIR: &str = "blockhash-to-height-index";

/// File extension of per-height block documents.
pub const BLOCK_FILE_EXTENSION: &str = "json";

// ---------------------------------------------------------------------------
// CacheConfig
// ---------------------------------------------------------------------------

/// Sizing knobs for [`crate::storage::CachedStorage`].
///
/// The cache is sized by time rather than entry count: "keep the last month
/// of blocks" is what operators actually reason about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// Span of chain history to keep cached.
    pub window: Duration,
    /// Expected time between consecutive blocks.
    pub block_interval: Duration,
}

impl CacheConfig {
    /// Build a config covering `days` of history at the default interval.
    pub fn with_days(days: u64) -> Self {
        Self {
            window: Duration::from_secs(days * 24 * 60 * 60),
            ..Self::default()
        }
    }

    /// Number of entries each internal LRU may hold.
    ///
    /// Never drops below [`MIN_LRU_SIZE`], so a tiny window still yields a
    /// constructible cache.
    pub fn max_entries(&self) -> usize {
        let interval = self.block_interval.as_secs().max(1);
        let entries = (self.window.as_secs() / interval) as usize;
        entries.max(MIN_LRU_SIZE)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            window: DEFAULT_CACHE_WINDOW,
            block_interval: DEFAULT_BLOCK_INTERVAL,
        }
    }
}
