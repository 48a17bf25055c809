//! Error types for chainlens.
//!
//! Three layers, mirroring when things go wrong:
//!
//! - [`ConfigError`]: a component was wired up wrong. Raised at construction.
//! - [`BlockError`]: a block's fields fail validation.
//! - [`StorageError`]: a read or write against a storage backend failed.
//!
//! "Not found" is never an error for single-key lookups; those return
//! `Ok(None)`. Only derived lookups that *require* a hit (height → block,
//! binary search) turn absence into an error.

use std::sync::Arc;

use thiserror::Error;

/// A component was constructed with invalid arguments.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// LRU capacity below the minimum of 2.
    #[error("cache max size must be at least 2, got {max_size}")]
    CacheTooSmall {
        /// The rejected capacity.
        max_size: usize,
    },

    /// A required delegate backend was not supplied.
    #[error("{0} storage must be provided")]
    MissingBackend(&'static str),

    /// A filesystem path that must exist does not.
    #[error("path does not exist: {0}")]
    InvalidPath(String),
}

/// A block failed field validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BlockError {
    #[error("empty block hash at height {height}")]
    EmptyHash { height: u64 },

    #[error("block {hash} has implausible time {time}: expected a timestamp after 2000-02-01")]
    ImplausibleTime { hash: String, time: i64 },

    #[error("block {hash} at height {height} has no previous block hash")]
    MissingPreviousHash { hash: String, height: u64 },

    #[error("invalid chain work '{0}': expected a hex string")]
    InvalidChainWork(String),
}

/// Errors surfaced by storage backends, storage wrappers, and the reader.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("invalid block: {0}")]
    Block(#[from] BlockError),

    /// The backend reported no hash for a height that was required to exist.
    #[error("a block for height {height} was not found")]
    HeightNotFound { height: u64 },

    /// The backend holds no blocks at all.
    #[error("storage reports zero blocks")]
    EmptyChain,

    /// The backend contradicted itself (e.g. count says a height exists but
    /// the height lookup comes back empty).
    #[error("inconsistent storage: {0}")]
    Inconsistent(String),

    /// `previous()` was called on a block not bound to any storage.
    #[error("block {hash} is not attached to a storage")]
    Detached { hash: String },

    /// A leaf backend failed for a reason of its own.
    #[error("{operation}({key}) failed: {message}")]
    Backend {
        operation: &'static str,
        key: String,
        message: String,
    },

    #[error("i/o error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed json in {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    /// A failure observed by a load shared between several waiters. Every
    /// waiter receives the same underlying error.
    #[error(transparent)]
    Shared(Arc<StorageError>),
}

impl StorageError {
    /// Shorthand for a [`StorageError::Backend`] failure.
    pub fn backend(operation: &'static str, key: impl ToString, message: impl ToString) -> Self {
        StorageError::Backend {
            operation,
            key: key.to_string(),
            message: message.to_string(),
        }
    }

    /// Strip [`StorageError::Shared`] wrappers to reach the original error.
    pub fn root(&self) -> &StorageError {
        match self {
            StorageError::Shared(inner) => inner.root(),
            other => other,
        }
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_messages_name_the_problem() {
        assert_eq!(
            ConfigError::CacheTooSmall { max_size: 1 }.to_string(),
            "cache max size must be at least 2, got 1"
        );
        assert_eq!(
            ConfigError::MissingBackend("primary").to_string(),
            "primary storage must be provided"
        );
    }

    #[test]
    fn backend_error_identifies_operation_and_key() {
        let err = StorageError::backend("block_hash", 42, "connection reset");
        assert_eq!(err.to_string(), "block_hash(42) failed: connection reset");
    }

    #[test]
    fn root_unwraps_shared_errors() {
        let shared = StorageError::Shared(Arc::new(StorageError::Shared(Arc::new(
            StorageError::HeightNotFound { height: 7 },
        ))));
        assert!(matches!(shared.root(), StorageError::HeightNotFound { height: 7 }));
        assert_eq!(shared.to_string(), "a block for height 7 was not found");
    }
}
