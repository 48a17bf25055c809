//! # CLI Interface
//!
//! Defines the command-line argument structure for `chainlens` using `clap`
//! derive. Storage flags are global so every subcommand reads through the
//! same stack.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};

use crate::logging::{LogFormat, LogLevel};

/// Historical blockchain header reader.
///
/// Reads block headers from a local directory of JSON documents, falling
/// back to a mirror directory (optionally cached in a sled database) for
/// anything the local copy lacks.
#[derive(Parser, Debug)]
#[command(
    name = "chainlens",
    about = "Historical blockchain header reader",
    version,
    propagate_version = true
)]
pub struct ChainlensCli {
    #[command(flatten)]
    pub storage: StorageArgs,

    /// Default log verbosity. `RUST_LOG` overrides it.
    #[arg(long, global = true, value_enum, env = "CHAINLENS_LOG_LEVEL", default_value = "warn")]
    pub log_level: LogLevel,

    /// Log output format.
    #[arg(long, global = true, value_enum, default_value = "pretty")]
    pub log_format: LogFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Where blocks come from.
#[derive(Args, Debug)]
pub struct StorageArgs {
    /// Directory of `<height>.json` documents. Queried first.
    #[arg(long, global = true, env = "CHAINLENS_BLOCKS_DIR", default_value = "blocks")]
    pub blocks_dir: PathBuf,

    /// Second block directory consulted when the first lacks a block or
    /// fails.
    #[arg(long, global = true, env = "CHAINLENS_MIRROR_DIR")]
    pub mirror_dir: Option<PathBuf>,

    /// sled database that persists every block read from the mirror.
    /// Requires `--mirror-dir`.
    #[arg(long, global = true, env = "CHAINLENS_CACHE_DB", requires = "mirror_dir")]
    pub cache_db: Option<PathBuf>,

    /// Days of chain history the in-memory LRU cache holds.
    #[arg(long, global = true, env = "CHAINLENS_CACHE_DAYS", default_value_t = 30)]
    pub cache_days: u64,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the block at the chain tip.
    Newest,
    /// Find the block nearest a Unix timestamp (exact match, else the latest
    /// block before it).
    Search(SearchArgs),
    /// Print the blocks bounding a time range.
    Subset(SubsetArgs),
    /// Print the tip and up to `count - 1` of its ancestors, newest first.
    Walk(WalkArgs),
    /// Print version information and exit.
    Version,
}

#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Target time, Unix seconds.
    #[arg(long)]
    pub time: i64,
}

#[derive(Args, Debug)]
pub struct SubsetArgs {
    /// Start of the range (RFC 3339, e.g. `2024-01-01T00:00:00Z`).
    #[arg(long)]
    pub from: DateTime<Utc>,

    /// End of the range (RFC 3339).
    #[arg(long)]
    pub to: DateTime<Utc>,
}

#[derive(Args, Debug)]
pub struct WalkArgs {
    /// Number of blocks to print.
    #[arg(long, default_value_t = 10)]
    pub count: u64,
}
