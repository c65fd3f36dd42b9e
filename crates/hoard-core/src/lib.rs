//! Core domain types and port definitions for hoard.
//!
//! This crate is the dependency root of the workspace. It holds the pure data
//! model (media items, pools, download jobs), the error taxonomy, settings,
//! path resolution, and the port traits that adapter crates implement.
//!
//! # Modules
//!
//! - `media` - Platform-agnostic media records (`MediaItem`, `PoolInfo`)
//! - `download` - Download job model, status machine, events and errors
//! - `cache` - Cache error types shared by the cache components
//! - `ports` - Trait abstractions for external collaborators
//! - `settings` - Application settings and validation
//! - `paths` - Data directory resolution

pub mod cache;
pub mod download;
pub mod media;
pub mod paths;
pub mod ports;
pub mod settings;

// Re-export commonly used types for convenience
pub use cache::{CacheError, ThumbnailError};
pub use download::{
    AggregateProgress, DownloadError, DownloadEvent, DownloadJob, JobId, JobStatus, Sequence,
};
pub use media::{MediaItem, MediaRating, PoolInfo, SearchPage, SearchParams};
pub use ports::{
    BroadcastDownloadEmitter, ByteSourcePort, ByteStream, CoreError, DownloadEventEmitterPort,
    DownloadManagerConfig, DownloadManagerPort, OpenedStream, PlatformClientPort, PlatformError,
    SettingsProvider, StaticSettings, ThumbnailFetcherPort,
};
pub use settings::{
    DEFAULT_DOWNLOAD_CONCURRENCY, DEFAULT_THUMBNAIL_CACHE_MAX_BYTES, Settings, SettingsError,
    SettingsUpdate, validate_settings,
};

pub use paths::{
    DirectoryCreationStrategy, PathError, data_root, ensure_directory, post_cache_path,
    thumbnail_cache_dir, ttl_cache_dir, verify_writable,
};
