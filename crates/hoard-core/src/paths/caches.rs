//! Locations of the cache storage units.

use std::path::PathBuf;

use super::error::PathError;
use super::platform::data_root;

/// Directory holding cached thumbnail files.
pub fn thumbnail_cache_dir() -> Result<PathBuf, PathError> {
    Ok(data_root()?.join("cache").join("thumbnails"))
}

/// Directory holding one `SQLite` file per TTL cache name.
pub fn ttl_cache_dir() -> Result<PathBuf, PathError> {
    Ok(data_root()?.join("cache").join("ttl"))
}

/// Path of the structured post/pool cache database.
pub fn post_cache_path() -> Result<PathBuf, PathError> {
    Ok(data_root()?.join("cache").join("posts.db"))
}
