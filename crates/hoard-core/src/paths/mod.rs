//! Path utilities for hoard data directories.
//!
//! Provides the canonical locations of every on-disk storage unit:
//! - Thumbnail cache directory
//! - TTL cache directory (one `SQLite` file per cache name)
//! - Structured post/pool cache database
//!
//! # Design
//!
//! - Returns `PathBuf` and `PathError` for clear error handling
//! - No interactive/terminal I/O
//! - OS-specific logic is kept private in `platform`

mod caches;
mod ensure;
mod error;
mod platform;

#[cfg(test)]
mod test_utils;

pub use error::PathError;

pub use platform::{DATA_DIR_ENV, data_root, normalize_user_path};

pub use caches::{post_cache_path, thumbnail_cache_dir, ttl_cache_dir};

pub use ensure::{DirectoryCreationStrategy, ensure_directory, verify_writable};
