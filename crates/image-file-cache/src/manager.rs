//! Image cache manager with single-flight downloads

use crate::codec;
use crate::error::{ImageCacheError, Result};
use crate::fetch::{parse_remote_url, ImageFetcher};
use crate::key::{CacheKey, Category};
use crate::store::FileStore;
use crate::types::{CacheConfig, CacheFailure, CacheOutcome, CacheStats, EvictionStats};
use futures::future::{BoxFuture, FutureExt, Shared};
use moka::sync::Cache;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use url::Url;

const SECS_PER_DAY: u64 = 24 * 60 * 60;

type InFlight = Shared<BoxFuture<'static, CacheOutcome>>;

/// Caches remote images as local JPEG files.
///
/// Cheap to clone; clones share the same directory, in-flight map and
/// counters. Every operation is best-effort: failures come back as
/// [`CacheOutcome::Failed`] or in [`EvictionStats`], never as panics.
#[derive(Clone)]
pub struct ImageCacheManager {
    inner: Arc<Inner>,
}

struct Inner {
    store: FileStore,
    fetcher: ImageFetcher,
    jpeg_quality: u8,
    /// File name -> the one download running for it
    in_flight: Mutex<HashMap<String, InFlight>>,
    /// File name -> why the last download failed
    recent_failures: Cache<String, CacheFailure>,
    hits: AtomicU64,
    misses: AtomicU64,
    downloads: AtomicU64,
    failures: AtomicU64,
    coalesced: AtomicU64,
}

impl ImageCacheManager {
    pub fn new(config: CacheConfig) -> Result<Self> {
        let fetcher = ImageFetcher::new(&config)?;

        let recent_failures = Cache::builder()
            .max_capacity(10_000)
            .time_to_live(config.failure_ttl)
            .build();

        Ok(Self {
            inner: Arc::new(Inner {
                store: FileStore::new(config.cache_dir),
                fetcher,
                jpeg_quality: config.jpeg_quality,
                in_flight: Mutex::new(HashMap::new()),
                recent_failures,
                hits: AtomicU64::new(0),
                misses: AtomicU64::new(0),
                downloads: AtomicU64::new(0),
                failures: AtomicU64::new(0),
                coalesced: AtomicU64::new(0),
            }),
        })
    }

    /// Create the cache directory
    pub async fn init(&self) -> Result<()> {
        self.inner.store.init().await?;
        info!(cache_dir = ?self.cache_dir(), "Image cache initialized");
        Ok(())
    }

    pub fn cache_dir(&self) -> &Path {
        self.inner.store.root()
    }

    /// Local file for `url` if it is already cached
    pub fn lookup(&self, url: &str, category: Category) -> Option<PathBuf> {
        let key = CacheKey::new(url, category)?;

        match self.inner.store.contains(&key) {
            Some(path) => {
                self.inner.hits.fetch_add(1, Ordering::Relaxed);
                Some(path)
            }
            None => {
                self.inner.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Make sure `url` is cached, downloading it if needed.
    ///
    /// Concurrent calls for the same key share one download. The download
    /// is detached from the caller: dropping this future does not cancel it.
    pub async fn ensure_cached(&self, url: &str, category: Category) -> CacheOutcome {
        let (key, remote) = match prepare(url, category) {
            Ok(prepared) => prepared,
            Err(failure) => return CacheOutcome::Failed { reason: failure },
        };

        if let Some(path) = self.inner.store.contains(&key) {
            return CacheOutcome::Cached { path };
        }

        self.join_or_start(key, remote).await
    }

    /// Start caching `url` in the background without waiting for it.
    ///
    /// Returns `Cached` on a hit and `Pending` once a download is running.
    /// Must be called from within a Tokio runtime.
    pub fn prefetch(&self, url: &str, category: Category) -> CacheOutcome {
        let (key, remote) = match prepare(url, category) {
            Ok(prepared) => prepared,
            Err(failure) => return CacheOutcome::Failed { reason: failure },
        };

        if let Some(path) = self.inner.store.contains(&key) {
            return CacheOutcome::Cached { path };
        }

        drop(self.join_or_start(key, remote));
        CacheOutcome::Pending
    }

    /// Where `url` stands, `None` if it was never attempted (or the
    /// failure has aged out).
    pub fn status(&self, url: &str, category: Category) -> Option<CacheOutcome> {
        let key = CacheKey::new(url, category)?;
        let name = key.file_name();

        // In-flight first: a download renames its file before leaving the
        // map, so a miss here followed by a file check cannot skip a
        // download that completed in between.
        if self.inner.lock_in_flight().contains_key(&name) {
            return Some(CacheOutcome::Pending);
        }

        if let Some(path) = self.inner.store.contains(&key) {
            return Some(CacheOutcome::Cached { path });
        }

        self.inner
            .recent_failures
            .get(&name)
            .map(|reason| CacheOutcome::Failed { reason })
    }

    /// Delete cache files last modified more than `max_age` ago
    pub fn evict_older_than(&self, max_age: Duration) -> EvictionStats {
        let stats = self.inner.store.sweep(max_age);
        info!(
            max_age_secs = max_age.as_secs(),
            scanned = stats.scanned,
            removed = stats.removed,
            failed = stats.failed,
            freed_bytes = stats.freed_bytes,
            "Eviction sweep finished"
        );
        stats
    }

    pub fn evict_older_than_days(&self, max_age_days: u64) -> EvictionStats {
        self.evict_older_than(Duration::from_secs(max_age_days.saturating_mul(SECS_PER_DAY)))
    }

    /// Total size of the cache directory in MiB
    pub fn cache_size_mb(&self) -> f64 {
        self.inner.store.total_size_bytes() as f64 / (1024.0 * 1024.0)
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.inner.hits.load(Ordering::Relaxed),
            misses: self.inner.misses.load(Ordering::Relaxed),
            downloads: self.inner.downloads.load(Ordering::Relaxed),
            failures: self.inner.failures.load(Ordering::Relaxed),
            coalesced: self.inner.coalesced.load(Ordering::Relaxed),
        }
    }

    /// Join the download running for `key`, or spawn one.
    ///
    /// Only map operations happen under the lock; the spawned task checks
    /// the disk before fetching.
    fn join_or_start(&self, key: CacheKey, remote: Url) -> InFlight {
        let name = key.file_name();
        let mut in_flight = self.inner.lock_in_flight();

        if let Some(existing) = in_flight.get(&name) {
            self.inner.coalesced.fetch_add(1, Ordering::Relaxed);
            debug!(file = %name, "Joining in-flight download");
            return existing.clone();
        }

        let inner = Arc::clone(&self.inner);
        let guard_name = name.clone();
        let task = tokio::spawn(async move {
            let _guard = InFlightGuard {
                inner: Arc::clone(&inner),
                name: guard_name,
            };
            inner.download(&key, &remote).await
        });

        let flight = async move {
            match task.await {
                Ok(outcome) => outcome,
                Err(e) => CacheOutcome::Failed {
                    reason: CacheFailure::from(&ImageCacheError::Task(e.to_string())),
                },
            }
        }
        .boxed()
        .shared();

        in_flight.insert(name, flight.clone());
        flight
    }
}

impl fmt::Debug for ImageCacheManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let in_flight = self
            .inner
            .in_flight
            .try_lock()
            .map(|guard| guard.len())
            .unwrap_or(0);

        f.debug_struct("ImageCacheManager")
            .field("cache_dir", &self.inner.store.root())
            .field("jpeg_quality", &self.inner.jpeg_quality)
            .field("in_flight", &in_flight)
            .field("stats", &self.stats())
            .finish()
    }
}

impl Inner {
    fn lock_in_flight(&self) -> MutexGuard<'_, HashMap<String, InFlight>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn download(&self, key: &CacheKey, remote: &Url) -> CacheOutcome {
        // An earlier download may have finished between the caller's check
        // and this task taking over the key
        if let Some(path) = self.store.contains(key) {
            return CacheOutcome::Cached { path };
        }

        self.downloads.fetch_add(1, Ordering::Relaxed);
        let started = Instant::now();
        let name = key.file_name();

        match self.fetch_and_store(key, remote).await {
            Ok(path) => {
                self.recent_failures.invalidate(&name);
                info!(
                    url = %remote,
                    category = %key.category(),
                    path = ?path,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Cached image"
                );
                CacheOutcome::Cached { path }
            }
            Err(e) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                warn!(
                    url = %remote,
                    category = %key.category(),
                    kind = %e.kind(),
                    error = %e,
                    "Failed to cache image"
                );
                let reason = CacheFailure::from(&e);
                self.recent_failures.insert(name, reason.clone());
                CacheOutcome::Failed { reason }
            }
        }
    }

    async fn fetch_and_store(&self, key: &CacheKey, remote: &Url) -> Result<PathBuf> {
        let bytes = self.fetcher.fetch(remote).await?;

        let store = self.store.clone();
        let key = key.clone();
        let quality = self.jpeg_quality;

        tokio::task::spawn_blocking(move || {
            let jpeg = codec::transcode_to_jpeg(&bytes, quality)?;
            store.write_atomic(&key, &jpeg)
        })
        .await
        .map_err(|e| ImageCacheError::Task(e.to_string()))?
    }
}

/// Removes the in-flight entry once its download task ends, even on panic
struct InFlightGuard {
    inner: Arc<Inner>,
    name: String,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.inner.lock_in_flight().remove(&self.name);
    }
}

fn prepare(url: &str, category: Category) -> std::result::Result<(CacheKey, Url), CacheFailure> {
    let checked = CacheKey::new(url, category)
        .ok_or_else(|| ImageCacheError::InvalidUrl("empty url".to_string()))
        .and_then(|key| parse_remote_url(url).map(|remote| (key, remote)));

    checked.map_err(|e| {
        warn!(url, category = %category, error = %e, "Rejected image request");
        CacheFailure::from(&e)
    })
}
