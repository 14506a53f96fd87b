//! Cache keys: (category, url) to a deterministic file name

use crate::error::ImageCacheError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// Extension of every cache file; entries are always stored as JPEG
pub const FILE_EXTENSION: &str = "jpg";

/// Logical namespace for cached images
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Profile,
    Cover,
    Artist,
    Thumbnail,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Profile,
        Category::Cover,
        Category::Artist,
        Category::Thumbnail,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Profile => "profile",
            Category::Cover => "cover",
            Category::Artist => "artist",
            Category::Thumbnail => "thumbnail",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = ImageCacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| ImageCacheError::UnknownCategory(s.to_string()))
    }
}

/// Identity of one cache entry
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    category: Category,
    url: String,
}

impl CacheKey {
    /// Surrounding whitespace is not part of the URL. Returns `None` for an
    /// empty (or whitespace-only) URL.
    pub fn new(url: &str, category: Category) -> Option<Self> {
        let url = url.trim();
        if url.is_empty() {
            return None;
        }
        Some(Self {
            category,
            url: url.to_string(),
        })
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Hex SHA-256 of the URL bytes
    pub fn url_hash(url: &str) -> String {
        hex::encode(Sha256::digest(url.as_bytes()))
    }

    /// `{category}_{sha256(url)}.jpg`
    pub fn file_name(&self) -> String {
        format!(
            "{}_{}.{}",
            self.category,
            Self::url_hash(&self.url),
            FILE_EXTENSION
        )
    }
}
