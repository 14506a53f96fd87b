//! Cache types

use crate::error::ImageCacheError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration for an image cache
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub cache_dir: PathBuf,
    /// JPEG quality (1-100) used when storing entries
    pub jpeg_quality: u8,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    /// Responses larger than this are rejected
    pub max_image_bytes: u64,
    /// How long a failed download is reported by `status`
    pub failure_ttl: Duration,
    pub user_agent: String,
}

impl CacheConfig {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            ..Self::default()
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from("./cache/images"),
            jpeg_quality: 90,
            connect_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(10),
            max_image_bytes: 20 * 1024 * 1024, // 20 MiB
            failure_ttl: Duration::from_secs(5 * 60),
            user_agent: "hypematch-image-cache/0.1".to_string(),
        }
    }
}

/// Failure taxonomy reported to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    InvalidUrl,
    Network,
    Decode,
    Filesystem,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureKind::InvalidUrl => "invalid_url",
            FailureKind::Network => "network",
            FailureKind::Decode => "decode",
            FailureKind::Filesystem => "filesystem",
        };
        f.write_str(s)
    }
}

/// Why an image could not be cached
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl CacheFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for CacheFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl From<&ImageCacheError> for CacheFailure {
    fn from(err: &ImageCacheError) -> Self {
        Self::new(err.kind(), err.to_string())
    }
}

/// Result of asking the cache for an image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CacheOutcome {
    /// The image is on disk at `path`
    Cached { path: PathBuf },
    /// A download for the key is in flight
    Pending,
    Failed { reason: CacheFailure },
}

impl CacheOutcome {
    pub fn is_cached(&self) -> bool {
        matches!(self, CacheOutcome::Cached { .. })
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            CacheOutcome::Cached { path } => Some(path.as_path()),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&CacheFailure> {
        match self {
            CacheOutcome::Failed { reason } => Some(reason),
            _ => None,
        }
    }
}

/// Counters since the cache was created
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub downloads: u64,
    pub failures: u64,
    /// Callers that joined an already running download
    pub coalesced: u64,
}

/// Result of one eviction sweep
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvictionStats {
    pub scanned: usize,
    pub removed: usize,
    pub failed: usize,
    pub freed_bytes: u64,
}
