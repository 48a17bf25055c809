//! # Composite (Fallback) Storage
//!
//! Presents a primary and a secondary backend as one. Every read goes to
//! *both* concurrently; the answers are reconciled afterwards:
//!
//! | Operation       | Result                                          |
//! |-----------------|-------------------------------------------------|
//! | `block_count`   | max(primary, secondary)                         |
//! | `block_hash`    | primary if present, else secondary, else `None` |
//! | `block`         | primary if present, else secondary, else `None` |
//!
//! A backend that fails is logged and treated as if it answered the
//! operation's empty value (0 or `None`), so the other one still gets its
//! say. Nothing is ever surfaced as an error from this layer.

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{warn, Span};

use super::BlockStorage;
use crate::block::Block;
use crate::error::{ConfigError, StorageResult};

/// Which side of a [`CompositeStorage`] produced a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Primary,
    Secondary,
}

impl Side {
    fn as_str(self) -> &'static str {
        match self {
            Side::Primary => "primary",
            Side::Secondary => "secondary",
        }
    }
}

/// Two backends, queried together, primary preferred.
pub struct CompositeStorage {
    primary: Arc<dyn BlockStorage>,
    secondary: Arc<dyn BlockStorage>,
    span: Span,
}

impl CompositeStorage {
    /// Order matters: `primary` wins whenever both have an answer.
    pub fn new(primary: Arc<dyn BlockStorage>, secondary: Arc<dyn BlockStorage>) -> Self {
        CompositeStorage {
            primary,
            secondary,
            span: tracing::debug_span!("composite_storage"),
        }
    }

    /// Build from optional parts, e.g. straight from user configuration.
    ///
    /// # Errors
    ///
    /// [`ConfigError::MissingBackend`] naming the absent side.
    pub fn try_new(
        primary: Option<Arc<dyn BlockStorage>>,
        secondary: Option<Arc<dyn BlockStorage>>,
    ) -> Result<Self, ConfigError> {
        let primary = primary.ok_or(ConfigError::MissingBackend("primary"))?;
        let secondary = secondary.ok_or(ConfigError::MissingBackend("secondary"))?;
        Ok(Self::new(primary, secondary))
    }

    /// Emit this component's events inside `span`.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn primary(&self) -> &Arc<dyn BlockStorage> {
        &self.primary
    }

    pub fn secondary(&self) -> &Arc<dyn BlockStorage> {
        &self.secondary
    }

    /// Run `op` against both backends at once. A failing side is replaced
    /// by `fallback` after logging.
    async fn invoke_both<'a, T, F, Fut>(
        &'a self,
        operation: &'static str,
        key: impl Display,
        fallback: T,
        op: F,
    ) -> (T, T)
    where
        T: Clone,
        F: Fn(&'a Arc<dyn BlockStorage>) -> Fut,
        Fut: Future<Output = StorageResult<T>>,
    {
        let (primary, secondary) = tokio::join!(op(&self.primary), op(&self.secondary));
        let settle = |side: Side, result: StorageResult<T>| match result {
            Ok(value) => value,
            Err(error) => {
                self.span.in_scope(|| {
                    warn!(
                        backend = side.as_str(),
                        operation,
                        key = %key,
                        %error,
                        "backend failed; treating as empty"
                    )
                });
                fallback.clone()
            }
        };
        (
            settle(Side::Primary, primary),
            settle(Side::Secondary, secondary),
        )
    }
}

#[async_trait]
impl BlockStorage for CompositeStorage {
    async fn block_count(&self) -> StorageResult<u64> {
        let (primary, secondary) = self
            .invoke_both("block_count", "", 0, |s| s.block_count())
            .await;
        Ok(primary.max(secondary))
    }

    async fn block_hash(&self, height: u64) -> StorageResult<Option<String>> {
        let (primary, secondary) = self
            .invoke_both("block_hash", height, None, |s| s.block_hash(height))
            .await;
        Ok(primary.or(secondary))
    }

    async fn block(&self, hash: &str) -> StorageResult<Option<Block>> {
        let (primary, secondary) = self
            .invoke_both("block", hash, None, |s| s.block(hash))
            .await;
        Ok(primary.or(secondary))
    }
}
