//! # Cache Primitives
//!
//! - [`LruCache`]: synchronous, arena-backed LRU with get-or-populate.
//! - [`LoadingCache`]: async wrapper whose entries are shared in-flight
//!   loads, so concurrent misses on one key cost a single backend call.

pub mod loading;
pub mod lru;

pub use loading::{Loader, LoadingCache};
pub use lru::LruCache;
