//! Flat-directory file store for cached images

use crate::error::Result;
use crate::key::CacheKey;
use crate::types::EvictionStats;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, warn};
use uuid::Uuid;

const TEMP_MARKER: &str = ".tmp-";

/// Temp files younger than this belong to a write that may still be running
pub const TEMP_FILE_GRACE: Duration = Duration::from_secs(60 * 60);

/// Immutable image files addressed by [`CacheKey::file_name`].
///
/// There is no index: existence and mtime of each file are the only state.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.root.join(key.file_name())
    }

    pub async fn init(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    /// Path of the entry if it is on disk
    pub fn contains(&self, key: &CacheKey) -> Option<PathBuf> {
        let path = self.path_for(key);
        path.is_file().then_some(path)
    }

    /// Write `bytes` under the key's final name via temp file + rename.
    ///
    /// A reader never observes a partially written entry. If the entry
    /// already exists it is left untouched.
    pub fn write_atomic(&self, key: &CacheKey, bytes: &[u8]) -> Result<PathBuf> {
        fs::create_dir_all(&self.root)?;
        let path = self.path_for(key);

        if path.is_file() {
            return Ok(path);
        }

        let tmp = self
            .root
            .join(format!(".{}{}{}", key.file_name(), TEMP_MARKER, Uuid::new_v4().simple()));

        if let Err(e) = write_synced(&tmp, bytes) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }

        if path.is_file() {
            let _ = fs::remove_file(&tmp);
            return Ok(path);
        }

        if let Err(e) = fs::rename(&tmp, &path) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }

        // Persist the rename itself; failure here does not invalidate the entry
        if let Ok(dir) = File::open(&self.root) {
            let _ = dir.sync_all();
        }

        debug!(path = ?path, size = bytes.len(), "Stored image");
        Ok(path)
    }

    /// Delete every file whose mtime is older than `max_age`.
    ///
    /// Temp files of in-progress writes are only removed once they are
    /// older than both `max_age` and [`TEMP_FILE_GRACE`].
    pub fn sweep(&self, max_age: Duration) -> EvictionStats {
        let mut stats = EvictionStats::default();

        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return stats,
            Err(e) => {
                warn!(cache_dir = ?self.root, error = %e, "Failed to read cache directory");
                stats.failed += 1;
                return stats;
            }
        };

        let now = SystemTime::now();

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "Failed to read cache directory entry");
                    stats.failed += 1;
                    continue;
                }
            };
            let path = entry.path();

            let metadata = match entry.metadata() {
                Ok(m) if m.is_file() => m,
                Ok(_) => continue,
                Err(e) => {
                    warn!(path = ?path, error = %e, "Failed to stat cache file");
                    stats.failed += 1;
                    continue;
                }
            };
            stats.scanned += 1;

            let modified = match metadata.modified() {
                Ok(t) => t,
                Err(e) => {
                    warn!(path = ?path, error = %e, "Cache file has no modification time");
                    stats.failed += 1;
                    continue;
                }
            };

            let threshold = if is_temp_file(&entry.file_name().to_string_lossy()) {
                max_age.max(TEMP_FILE_GRACE)
            } else {
                max_age
            };

            // mtime in the future counts as fresh
            let age = now.duration_since(modified).unwrap_or(Duration::ZERO);
            if age <= threshold {
                continue;
            }

            match fs::remove_file(&path) {
                Ok(()) => {
                    stats.removed += 1;
                    stats.freed_bytes += metadata.len();
                    debug!(path = ?path, age_secs = age.as_secs(), "Evicted cache file");
                }
                // Already gone (another sweep won)
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(path = ?path, error = %e, "Failed to evict cache file");
                    stats.failed += 1;
                }
            }
        }

        stats
    }

    /// Sum of file sizes in the directory, 0 if it does not exist
    pub fn total_size_bytes(&self) -> u64 {
        let Ok(entries) = fs::read_dir(&self.root) else {
            return 0;
        };

        entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.metadata().ok())
            .filter(|m| m.is_file())
            .map(|m| m.len())
            .sum()
    }
}

fn is_temp_file(name: &str) -> bool {
    name.starts_with('.') && name.contains(TEMP_MARKER)
}

fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    file.flush()?;
    file.sync_all()
}
