// Copyright (c) 2026 Chainlens Contributors. MIT License.
// See LICENSE for details.

//! # Chainlens CLI
//!
//! Entry point for the `chainlens` binary. Parses CLI arguments, initializes
//! logging, assembles the storage stack, and prints query results as JSON.
//!
//! The binary supports five subcommands:
//!
//! - `newest`  — the block at the chain tip
//! - `search`  — the block nearest a Unix timestamp
//! - `subset`  — the blocks bounding a time range
//! - `walk`    — the tip and its ancestors
//! - `version` — print build version information

mod cli;
mod logging;

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use serde::Serialize;

use chainlens::{
    Block, BlockStorage, BlockchainReader, CacheConfig, CachedStorage, CachingProxyStorage,
    CompositeStorage, FileSystemStorage, SledStorage,
};

use cli::{ChainlensCli, Commands, StorageArgs};

/// JSON shape of a block on stdout. Field names follow the node RPC
/// documents the block directories are made of.
#[derive(Debug, Serialize)]
struct BlockView {
    hash: String,
    height: u64,
    time: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    time_utc: Option<DateTime<Utc>>,
    previousblockhash: String,
    chainwork: String,
}

impl From<&Block> for BlockView {
    fn from(block: &Block) -> Self {
        BlockView {
            hash: block.hash().to_string(),
            height: block.height(),
            time: block.time(),
            time_utc: DateTime::from_timestamp(block.time(), 0),
            previousblockhash: block.previous_block_hash().to_string(),
            chainwork: block.chain_work().to_hex(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChainView {
    oldest: BlockView,
    newest: BlockView,
    length: u64,
    duration_secs: i64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = ChainlensCli::parse();

    if let Commands::Version = cli.command {
        print_version();
        return Ok(());
    }

    logging::init_logging(cli.log_level, cli.log_format);

    let storage = build_storage(&cli.storage)?;
    let reader = BlockchainReader::new(storage);

    match cli.command {
        Commands::Newest => {
            let block = reader.newest_block().await.context("failed to read the newest block")?;
            print_json(&BlockView::from(&block))
        }
        Commands::Search(args) => {
            let block = reader
                .search(args.time)
                .await
                .with_context(|| format!("search for time {} failed", args.time))?;
            print_json(&BlockView::from(&block))
        }
        Commands::Subset(args) => {
            anyhow::ensure!(args.from <= args.to, "--from must not be after --to");
            let chain = reader
                .subset(args.from, args.to)
                .await
                .with_context(|| format!("subset {} .. {} failed", args.from, args.to))?;
            print_json(&ChainView {
                oldest: BlockView::from(chain.oldest_block()),
                newest: BlockView::from(chain.newest_block()),
                length: chain.length(),
                duration_secs: chain.duration_secs(),
            })
        }
        Commands::Walk(args) => {
            let blocks = walk(&reader, args.count).await?;
            print_json(&blocks)
        }
        Commands::Version => Ok(()),
    }
}

/// Assemble the storage stack described by the flags:
///
/// ```text
/// no mirror:    CachedStorage(FileSystem(blocks_dir))
/// mirror:       Composite(FileSystem(blocks_dir),
///                         CachedStorage([CachingProxy(] FileSystem(mirror_dir) [, Sled(cache_db))]))
/// ```
fn build_storage(args: &StorageArgs) -> Result<Arc<dyn BlockStorage>> {
    let cache_config = CacheConfig::with_days(args.cache_days);

    let primary = FileSystemStorage::open(&args.blocks_dir)
        .with_context(|| format!("cannot use blocks directory {}", args.blocks_dir.display()))?;

    let Some(mirror_dir) = &args.mirror_dir else {
        tracing::info!(blocks_dir = %args.blocks_dir.display(), "reading from a single directory");
        let cached = CachedStorage::with_config(primary, &cache_config)?;
        return Ok(cached);
    };

    let mirror = FileSystemStorage::open(mirror_dir)
        .with_context(|| format!("cannot use mirror directory {}", mirror_dir.display()))?;

    let origin: Arc<dyn BlockStorage> = match &args.cache_db {
        Some(db_path) => {
            let sled = SledStorage::open(db_path)
                .with_context(|| format!("failed to open cache database at {}", db_path.display()))?;
            tracing::info!(path = %db_path.display(), "cache database opened");
            Arc::new(CachingProxyStorage::new(mirror, sled))
        }
        None => mirror,
    };

    let secondary = CachedStorage::with_config(origin, &cache_config)?;
    tracing::info!(
        blocks_dir = %args.blocks_dir.display(),
        mirror_dir = %mirror_dir.display(),
        cache_entries = secondary.max_entries(),
        "storage stack ready"
    );
    Ok(Arc::new(CompositeStorage::new(primary, secondary)))
}

/// The newest block and up to `count - 1` ancestors, newest first. Stops
/// early at genesis.
async fn walk(reader: &BlockchainReader, count: u64) -> Result<Vec<BlockView>> {
    let mut views = Vec::new();
    if count == 0 {
        return Ok(views);
    }
    let mut block = reader.newest_block().await.context("failed to read the newest block")?;
    views.push(BlockView::from(&block));

    while (views.len() as u64) < count {
        let parent = block
            .previous()
            .await
            .with_context(|| format!("failed to read the parent of block {}", block.hash()))?;
        match parent {
            Some(parent) => {
                views.push(BlockView::from(&parent));
                block = parent;
            }
            None => break,
        }
    }
    Ok(views)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("failed to encode output")?;
    println!("{json}");
    Ok(())
}

/// Prints version information to stdout.
fn print_version() {
    println!("chainlens {}", env!("CARGO_PKG_VERSION"));
    println!("rustc     {}", rustc_version());
}

/// Returns the Rust compiler version used to build this binary.
fn rustc_version() -> &'static str {
    option_env!("RUSTC_VERSION").unwrap_or("unknown")
}
