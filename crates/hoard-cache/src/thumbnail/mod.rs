//! Disk-backed thumbnail cache.
//!
//! Maps a remote thumbnail URL to a local file named after the SHA-256 of
//! the URL. Total size is bounded by a byte budget; least-recently-used
//! entries are evicted on insert. Concurrent lookups of the same URL share a
//! single fetch.
//!
//! # Locking
//!
//! Two std mutexes, always taken in the order `in_flight` then `index` and
//! never held across an await point. Neither guards filesystem calls.
//!
//! Renames into the directory and deletions of evicted files run under the
//! async `files` mutex, so a late deletion cannot remove the file of a
//! refetched key.

mod index;
mod lease;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::SystemTime;

use bytes::Bytes;
use hoard_core::{
    CacheError, DirectoryCreationStrategy, Settings, ThumbnailError, ThumbnailFetcherPort,
    ensure_directory,
};
use hoard_runtime::WorkQueue;
use sha2::{Digest, Sha256};
use tokio::sync::{Mutex as AsyncMutex, OnceCell};
use tokio_util::sync::CancellationToken;

use index::LruIndex;
pub use lease::ThumbnailLease;

const TMP_SUFFIX: &str = ".tmp";
const FALLBACK_DIR_NAME: &str = "hoard-thumbs";
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "avif", "bmp"];

type Flight = Arc<OnceCell<Result<PathBuf, ThumbnailError>>>;

/// Configuration for a [`ThumbnailCache`].
#[derive(Debug, Clone)]
pub struct ThumbnailCacheConfig {
    /// Directory owned by the cache.
    pub dir: PathBuf,
    /// Total size budget in bytes.
    pub max_bytes: u64,
}

impl ThumbnailCacheConfig {
    pub fn new(dir: impl Into<PathBuf>, max_bytes: u64) -> Self {
        Self {
            dir: dir.into(),
            max_bytes,
        }
    }

    /// Budget from user settings.
    pub fn from_settings(dir: impl Into<PathBuf>, settings: &Settings) -> Self {
        Self::new(dir, settings.effective_thumbnail_budget())
    }
}

/// Disk cache of remote thumbnails.
pub struct ThumbnailCache {
    dir: PathBuf,
    fetcher: Arc<dyn ThumbnailFetcherPort>,
    index: Arc<Mutex<LruIndex>>,
    in_flight: Mutex<HashMap<String, Flight>>,
    files: AsyncMutex<()>,
}

impl ThumbnailCache {
    /// Open the cache, rebuilding the index from files already on disk.
    ///
    /// Leftover temp files from an interrupted write are deleted. Failure
    /// to create the directory is fatal.
    pub async fn open(
        config: ThumbnailCacheConfig,
        fetcher: Arc<dyn ThumbnailFetcherPort>,
    ) -> Result<Self, CacheError> {
        ensure_directory(&config.dir, DirectoryCreationStrategy::AutoCreate)
            .map_err(|e| CacheError::Storage(e.to_string()))?;

        let mut found: Vec<(SystemTime, String, PathBuf, u64)> = Vec::new();
        let mut dir = tokio::fs::read_dir(&config.dir).await?;
        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if name.ends_with(TMP_SUFFIX) {
                if let Err(e) = tokio::fs::remove_file(&path).await {
                    tracing::warn!(target: "hoard.cache", path = %path.display(), error = %e, "Failed to remove stale temp file");
                }
                continue;
            }
            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }
            let key = name.split('.').next().unwrap_or(name).to_string();
            let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            found.push((modified, key, path, metadata.len()));
        }
        found.sort_by_key(|(modified, ..)| *modified);

        let mut index = LruIndex::new(config.max_bytes);
        let mut victims = Vec::new();
        for (_, key, path, size) in found {
            victims.extend(index.insert(key, path, size));
        }
        remove_files(victims).await;

        tracing::debug!(
            target: "hoard.cache",
            dir = %config.dir.display(),
            entries = index.len(),
            used_bytes = index.used_bytes(),
            "Thumbnail cache opened"
        );

        Ok(Self {
            dir: config.dir,
            fetcher,
            index: Arc::new(Mutex::new(index)),
            in_flight: Mutex::new(HashMap::new()),
            files: AsyncMutex::new(()),
        })
    }

    /// Local path for `url`, fetching it on a miss.
    pub async fn get_or_add(&self, url: &str) -> Result<PathBuf, ThumbnailError> {
        self.get_or_add_cancellable(url, &CancellationToken::new())
            .await
    }

    /// Like [`get_or_add`](Self::get_or_add), giving up when `cancel` fires.
    ///
    /// Concurrent callers for the same URL join one fetch. If the caller
    /// driving the fetch is cancelled, a waiting caller takes it over.
    pub async fn get_or_add_cancellable(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<PathBuf, ThumbnailError> {
        let key = cache_key(url);
        if let Some(path) = self.lookup_on_disk(&key).await {
            return Ok(path);
        }

        let flight = {
            let mut in_flight = self.lock_in_flight();
            // The leader may have finished between the first lookup and here.
            if let Some(path) = self.lock_index().get(&key) {
                return Ok(path);
            }
            match in_flight.get(&key) {
                Some(flight) => {
                    tracing::debug!(target: "hoard.cache", url = %url, "Joining in-flight thumbnail fetch");
                    Arc::clone(flight)
                }
                None => {
                    let flight: Flight = Arc::new(OnceCell::new());
                    in_flight.insert(key.clone(), Arc::clone(&flight));
                    flight
                }
            }
        };

        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => None,
            result = flight.get_or_init(|| self.fetch_and_store(url, &key)) => Some(result.clone()),
        };

        let mut in_flight = self.lock_in_flight();
        let current = in_flight
            .get(&key)
            .is_some_and(|current| Arc::ptr_eq(current, &flight));
        // The map and this caller: nobody else is waiting on the flight.
        let abandoned = outcome.is_none() && Arc::strong_count(&flight) <= 2;
        if current && (outcome.is_some() || abandoned) {
            in_flight.remove(&key);
        }
        drop(in_flight);

        outcome.unwrap_or(Err(ThumbnailError::Cancelled))
    }

    /// Cached path for `url` without ever fetching or touching the disk.
    pub fn try_get_cached_path(&self, url: &str) -> Option<PathBuf> {
        self.lock_index().get(&cache_key(url))
    }

    /// Pin the cached entry for `url` so eviction skips it while the lease
    /// is alive.
    pub fn open(&self, url: &str) -> Option<ThumbnailLease> {
        let key = cache_key(url);
        let path = self.lock_index().pin(&key)?;
        Some(ThumbnailLease::new(Arc::clone(&self.index), key, path))
    }

    /// Bytes currently accounted to cached files.
    pub fn get_used_bytes(&self) -> u64 {
        self.lock_index().used_bytes()
    }

    /// Directory owned by the cache.
    pub fn cache_path(&self) -> &Path {
        &self.dir
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.lock_index().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Evict every entry not pinned by a lease. Returns the number removed.
    pub async fn clear(&self) -> usize {
        let _files = self.files.lock().await;
        let victims = self.lock_index().clear();
        let removed = victims.len();
        remove_files(victims).await;

        tracing::info!(target: "hoard.cache", removed, "Thumbnail cache cleared");
        removed
    }

    /// Fetch `urls` in the background. Returns how many were scheduled.
    pub fn warm<I>(self: &Arc<Self>, urls: I, queue: &WorkQueue) -> usize
    where
        I: IntoIterator<Item = String>,
    {
        let mut scheduled = 0;
        for url in urls {
            if self.try_get_cached_path(&url).is_some() {
                continue;
            }
            let cache = Arc::clone(self);
            let accepted = queue.enqueue(move |token| async move {
                if let Err(e) = cache.get_or_add_cancellable(&url, &token).await {
                    tracing::debug!(target: "hoard.cache", url = %url, error = %e, "Thumbnail warm failed");
                }
            });
            if !accepted {
                break;
            }
            scheduled += 1;
        }
        scheduled
    }

    /// Index lookup that drops entries whose file has disappeared.
    async fn lookup_on_disk(&self, key: &str) -> Option<PathBuf> {
        let path = self.lock_index().get(key)?;
        if file_exists(&path).await {
            return Some(path);
        }

        let _files = self.files.lock().await;
        if file_exists(&path).await {
            return Some(path);
        }
        tracing::debug!(target: "hoard.cache", path = %path.display(), "Cached thumbnail vanished");
        self.lock_index().remove(key);
        None
    }

    async fn fetch_and_store(&self, url: &str, key: &str) -> Result<PathBuf, ThumbnailError> {
        tracing::debug!(target: "hoard.cache", url = %url, "Fetching thumbnail");
        let bytes = self.fetcher.fetch(url).await?;
        let file_name = format!("{key}.{}", image_extension(url));
        let path = self.dir.join(&file_name);

        let tmp = tmp_path(&path);
        let written = match tokio::fs::write(&tmp, &bytes).await {
            Ok(()) => self.publish(key, &tmp, &path, bytes.len() as u64).await,
            Err(e) => Err(e),
        };

        match written {
            Ok(()) => Ok(path),
            Err(e) => {
                tracing::warn!(
                    target: "hoard.cache",
                    url = %url,
                    error = %e,
                    "Thumbnail cache write failed, serving from temp dir"
                );
                write_fallback(&file_name, &bytes).await
            }
        }
    }

    /// Move a written temp file into place and admit it to the index.
    async fn publish(&self, key: &str, tmp: &Path, path: &Path, size: u64) -> std::io::Result<()> {
        let _files = self.files.lock().await;
        if let Err(e) = tokio::fs::rename(tmp, path).await {
            let _ = tokio::fs::remove_file(tmp).await;
            return Err(e);
        }
        let victims = self
            .lock_index()
            .insert(key.to_string(), path.to_path_buf(), size);
        remove_files(victims).await;
        Ok(())
    }

    fn lock_index(&self) -> MutexGuard<'_, LruIndex> {
        self.index.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_in_flight(&self) -> MutexGuard<'_, HashMap<String, Flight>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Stable file key for a URL.
fn cache_key(url: &str) -> String {
    format!("{:x}", Sha256::digest(url.as_bytes()))
}

fn image_extension(url: &str) -> &'static str {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let ext = path
        .rsplit('/')
        .next()
        .and_then(|segment| segment.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase());

    ext.and_then(|ext| IMAGE_EXTENSIONS.iter().find(|known| **known == ext).copied())
        .unwrap_or("img")
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(TMP_SUFFIX);
    PathBuf::from(tmp)
}

async fn file_exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

async fn write_fallback(file_name: &str, bytes: &Bytes) -> Result<PathBuf, ThumbnailError> {
    let dir = std::env::temp_dir().join(FALLBACK_DIR_NAME);
    tokio::fs::create_dir_all(&dir)
        .await
        .map_err(|e| ThumbnailError::Storage(e.to_string()))?;
    let path = dir.join(file_name);
    tokio::fs::write(&path, bytes)
        .await
        .map_err(|e| ThumbnailError::Storage(e.to_string()))?;
    Ok(path)
}

/// Delete evicted files. Callers hold the `files` lock once the cache is
/// open.
async fn remove_files(paths: Vec<PathBuf>) {
    for path in paths {
        if let Err(e) = tokio::fs::remove_file(&path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(target: "hoard.cache", path = %path.display(), error = %e, "Failed to delete evicted thumbnail");
            }
        }
    }
}
