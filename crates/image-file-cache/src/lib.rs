//! File-based image cache keyed by remote URL and category
//!
//! Downloads a remote image at most once per key, re-encodes it as JPEG and
//! stores it under a deterministic file name in a flat directory. Concurrent
//! requests for the same key are coalesced into a single download, writes
//! are atomic (temp file + rename), and old entries are removed by an
//! explicit age-based sweep.

mod codec;
mod error;
mod fetch;
mod key;
mod manager;
mod store;
mod types;

pub use error::{ImageCacheError, Result};
pub use key::{CacheKey, Category};
pub use manager::ImageCacheManager;
pub use types::{
    CacheConfig, CacheFailure, CacheOutcome, CacheStats, EvictionStats, FailureKind,
};
