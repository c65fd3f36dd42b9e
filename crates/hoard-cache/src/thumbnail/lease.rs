use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use super::index::LruIndex;

/// Keeps a cached thumbnail on disk for as long as it is held.
///
/// Eviction skips pinned entries; dropping the lease releases the pin.
#[derive(Debug)]
pub struct ThumbnailLease {
    index: Arc<Mutex<LruIndex>>,
    key: String,
    path: PathBuf,
}

impl ThumbnailLease {
    pub(super) const fn new(index: Arc<Mutex<LruIndex>>, key: String, path: PathBuf) -> Self {
        Self { index, key, path }
    }

    /// Local file path of the thumbnail.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ThumbnailLease {
    fn drop(&mut self) {
        self.index
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .unpin(&self.key);
    }
}
