//! # File-System Block Storage
//!
//! Reads (and optionally writes) a chain stored as one JSON document per
//! block in a single directory:
//!
//! ```text
//! <dir>/
//! ├── 0.json
//! ├── 1.json
//! ├── ...
//! └── blockhash-to-height-index/
//!     ├── 00040fe8ec84...   (contents: "0")
//!     └── 0007bc227e1c...   (contents: "1")
//! ```
//!
//! Documents use the field names bitcoin-family nodes emit from
//! `getblockheader` (`previousblockhash`, `chainwork`), so a dump from a
//! node's RPC can be dropped in as-is. Extra fields are ignored.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use super::{BlockStorage, WritableBlockStorage};
use crate::block::{Block, BlockHeader, ChainWork};
use crate::config::{BLOCK_FILE_EXTENSION, HASH_INDEX_DIR};
use crate::error::{ConfigError, StorageError, StorageResult};

/// On-disk shape of a block document.
#[derive(Debug, Serialize, Deserialize)]
struct BlockDocument {
    hash: String,
    height: u64,
    time: i64,
    #[serde(rename = "previousblockhash", default)]
    previous_block_hash: String,
    #[serde(rename = "chainwork")]
    chain_work: ChainWork,
}

impl BlockDocument {
    fn from_header(header: &BlockHeader) -> Self {
        BlockDocument {
            hash: header.hash.clone(),
            height: header.height,
            time: header.time,
            previous_block_hash: header.previous_block_hash.clone(),
            chain_work: header.chain_work.clone(),
        }
    }

    fn into_header(self) -> Result<BlockHeader, crate::error::BlockError> {
        BlockHeader::new(
            self.hash,
            self.height,
            self.time,
            self.previous_block_hash,
            self.chain_work,
        )
    }
}

/// A directory of `<height>.json` block documents.
#[derive(Debug)]
pub struct FileSystemStorage {
    me: Weak<FileSystemStorage>,
    dir: PathBuf,
}

impl FileSystemStorage {
    /// # Errors
    ///
    /// [`ConfigError::InvalidPath`] if `dir` does not exist.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Arc<Self>, ConfigError> {
        let dir = dir.into();
        if !dir.is_dir() {
            return Err(ConfigError::InvalidPath(dir.display().to_string()));
        }
        debug!(path = %dir.display(), "using block directory");
        Ok(Arc::new_cyclic(|me| FileSystemStorage {
            me: me.clone(),
            dir,
        }))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn block_path(&self, height: u64) -> PathBuf {
        self.dir.join(format!("{height}.{BLOCK_FILE_EXTENSION}"))
    }

    fn index_path(&self, hash: &str) -> PathBuf {
        self.dir.join(HASH_INDEX_DIR).join(hash)
    }

    fn attach(&self, header: BlockHeader) -> Block {
        match self.me.upgrade() {
            Some(me) => Block::attached(header, me),
            None => Block::detached(header),
        }
    }

    /// Load and validate the document at `height`. A missing file is
    /// `Ok(None)`; anything else that goes wrong is an error naming the path.
    async fn load_header(&self, height: u64) -> StorageResult<Option<BlockHeader>> {
        let path = self.block_path(height);
        let Some(bytes) = read_optional(&path).await? else {
            return Ok(None);
        };
        let document: BlockDocument = serde_json::from_slice(&bytes).map_err(|source| {
            error!(path = %path.display(), %source, "malformed block document");
            StorageError::Json {
                path: path.display().to_string(),
                source,
            }
        })?;
        Ok(Some(document.into_header()?))
    }

    async fn lookup_height(&self, hash: &str) -> StorageResult<Option<u64>> {
        // Hashes are hex; anything else cannot be a file name we wrote.
        if hash.is_empty() || !hash.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Ok(None);
        }
        let path = self.index_path(hash);
        let Some(bytes) = read_optional(&path).await? else {
            return Ok(None);
        };
        let text = String::from_utf8_lossy(&bytes);
        text.trim().parse::<u64>().map(Some).map_err(|e| {
            StorageError::backend("lookup_height", hash, format!("bad index entry {}: {e}", path.display()))
        })
    }

    async fn drop_index_entry(&self, hash: &str) -> StorageResult<()> {
        let path = self.index_path(hash);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!(hash, "removed stale index entry");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StorageError::Io {
                path: path.display().to_string(),
                source,
            }),
        }
    }
}

async fn read_optional(path: &Path) -> StorageResult<Option<Vec<u8>>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(source) => {
            error!(path = %path.display(), %source, "failed to read file");
            Err(StorageError::Io {
                path: path.display().to_string(),
                source,
            })
        }
    }
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> StorageError + '_ {
    move |source| StorageError::Io {
        path: path.display().to_string(),
        source,
    }
}

#[async_trait]
impl BlockStorage for FileSystemStorage {
    /// Highest `<height>.json` present + 1; 0 for an empty directory.
    async fn block_count(&self) -> StorageResult<u64> {
        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(io_error(&self.dir))?;
        let mut highest: Option<u64> = None;
        while let Some(entry) = entries.next_entry().await.map_err(io_error(&self.dir))? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(BLOCK_FILE_EXTENSION) {
                continue;
            }
            let height = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.parse::<u64>().ok());
            if let Some(height) = height {
                highest = Some(highest.map_or(height, |h| h.max(height)));
            }
        }
        Ok(highest.map_or(0, |h| h + 1))
    }

    async fn block_hash(&self, height: u64) -> StorageResult<Option<String>> {
        Ok(self.load_header(height).await?.map(|header| header.hash))
    }

    async fn block(&self, hash: &str) -> StorageResult<Option<Block>> {
        let Some(height) = self.lookup_height(hash).await? else {
            debug!(hash, "hash not in index");
            return Ok(None);
        };
        let header = self.load_header(height).await?.ok_or_else(|| {
            StorageError::Inconsistent(format!(
                "hash index points {hash} at height {height}, but no block file exists"
            ))
        })?;
        if header.hash != hash {
            debug!(hash, height, found = %header.hash, "stale index entry");
            return Ok(None);
        }
        Ok(Some(self.attach(header)))
    }
}

#[async_trait]
impl WritableBlockStorage for FileSystemStorage {
    /// Writes `<height>.json` and the index entry for its hash. Overwriting
    /// a height drops the index entry of the block it replaces.
    async fn put_block(&self, block: &Block) -> StorageResult<()> {
        match self.load_header(block.height()).await {
            Ok(Some(previous)) if previous.hash != block.hash() => {
                self.drop_index_entry(&previous.hash).await?;
            }
            Ok(_) => {}
            Err(error) => {
                warn!(height = block.height(), %error, "overwriting unreadable block document");
            }
        }

        let document = BlockDocument::from_header(block.header());
        let json = serde_json::to_vec_pretty(&document)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        let path = self.block_path(block.height());
        tokio::fs::write(&path, json).await.map_err(io_error(&path))?;

        let index_dir = self.dir.join(HASH_INDEX_DIR);
        tokio::fs::create_dir_all(&index_dir)
            .await
            .map_err(io_error(&index_dir))?;
        let index = self.index_path(block.hash());
        tokio::fs::write(&index, block.height().to_string())
            .await
            .map_err(io_error(&index))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::testing::sequential_headers;
    use crate::storage::BlockStorageExt;

    async fn populated(count: u64) -> (tempfile::TempDir, Arc<FileSystemStorage>) {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = FileSystemStorage::open(dir.path()).expect("open");
        for header in sequential_headers(count, 1_500_000_000, 150) {
            storage.put_block(&Block::detached(header)).await.expect("put");
        }
        (dir, storage)
    }

    #[test]
    fn missing_directory_is_a_config_error() {
        let err = FileSystemStorage::open("/definitely/not/here").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPath(_)));
    }

    #[tokio::test]
    async fn empty_directory_has_zero_blocks() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileSystemStorage::open(dir.path()).unwrap();
        assert_eq!(storage.block_count().await.unwrap(), 0);
        assert_eq!(storage.block_hash(0).await.unwrap(), None);
    }

    #[tokio::test]
    async fn reads_back_written_blocks() {
        let (_dir, storage) = populated(5).await;
        assert_eq!(storage.block_count().await.unwrap(), 5);

        let block = storage.block_at_height(4).await.unwrap().expect("block");
        assert_eq!(block.hash(), "hash4");
        assert_eq!(block.previous_block_hash(), "hash3");
        let parent = block.previous().await.unwrap().expect("parent");
        assert_eq!(parent.height(), 3);
    }

    #[tokio::test]
    async fn parses_node_style_documents() {
        let dir = tempfile::tempdir().unwrap();
        let doc = r#"{
            "hash": "0007bc227e1c57a4a70e237cad00e7b7ce565155ab49166bc57397a26d339283",
            "confirmations": 400000,
            "height": 1,
            "version": 4,
            "time": 1477671596,
            "previousblockhash": "00040fe8ec8471911baa1db1266ea15dd06b4a8a5c453883c000b031973dce08",
            "chainwork": "0000000000000000000000000000000000000000000000000000000000004000"
        }"#;
        std::fs::write(dir.path().join("1.json"), doc).unwrap();
        std::fs::create_dir(dir.path().join(HASH_INDEX_DIR)).unwrap();
        std::fs::write(
            dir.path()
                .join(HASH_INDEX_DIR)
                .join("0007bc227e1c57a4a70e237cad00e7b7ce565155ab49166bc57397a26d339283"),
            "1\n",
        )
        .unwrap();

        let storage = FileSystemStorage::open(dir.path()).unwrap();
        assert_eq!(storage.block_count().await.unwrap(), 2);
        let block = storage
            .block("0007bc227e1c57a4a70e237cad00e7b7ce565155ab49166bc57397a26d339283")
            .await
            .unwrap()
            .expect("block");
        assert_eq!(block.time(), 1_477_671_596);
        assert_eq!(block.chain_work(), &ChainWork::from(0x4000u64));
    }

    #[tokio::test]
    async fn unknown_hash_is_absent() {
        let (_dir, storage) = populated(2).await;
        assert!(storage.block("ffff").await.unwrap().is_none());
        assert!(storage.block("../0.json").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn malformed_document_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("0.json"), "{ not json").unwrap();
        let storage = FileSystemStorage::open(dir.path()).unwrap();
        let err = storage.block_hash(0).await.unwrap_err();
        assert!(matches!(err, StorageError::Json { .. }));
    }

    #[tokio::test]
    async fn overwriting_a_height_drops_the_stale_hash() {
        let (dir, storage) = populated(1).await;
        let mut replacement = sequential_headers(1, 1_500_000_000, 150).remove(0);
        replacement.hash = "fork".to_string();
        storage.put_block(&Block::detached(replacement)).await.unwrap();

        assert!(storage.block("hash0").await.unwrap().is_none());
        assert!(!dir.path().join(HASH_INDEX_DIR).join("hash0").exists());
        assert_eq!(storage.block("fork").await.unwrap().unwrap().hash(), "fork");
        assert_eq!(storage.block_at_height(0).await.unwrap().unwrap().hash(), "fork");
    }

    #[tokio::test]
    async fn index_entry_for_another_hash_is_a_miss() {
        let (dir, storage) = populated(2).await;
        // An index file left over from an older writer, pointing at height 1.
        std::fs::write(dir.path().join(HASH_INDEX_DIR).join("orphan"), "1").unwrap();
        assert!(storage.block("orphan").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn dangling_index_entry_is_inconsistent() {
        let (dir, storage) = populated(2).await;
        std::fs::remove_file(dir.path().join("1.json")).unwrap();
        let err = storage.block("hash1").await.unwrap_err();
        assert!(matches!(err, StorageError::Inconsistent(_)));
    }
}
