//! Port definitions (trait abstractions) for external systems.
//!
//! Ports define the interfaces that the core domain expects from infrastructure.
//! They contain no implementation details and use only domain types.
//!
//! # Design Rules
//!
//! - No `sqlx` or `reqwest` types in any signature
//! - Byte streams are domain streams of `Bytes` with `DownloadError` items
//! - Every port is `Send + Sync` and usable as `Arc<dyn Port>`

pub mod byte_source;
pub mod download_event_emitter;
pub mod download_manager;
pub mod platform;
pub mod settings_provider;
pub mod thumbnail_fetcher;

use thiserror::Error;

pub use byte_source::{ByteSourcePort, ByteStream, OpenedStream};
pub use download_event_emitter::{BroadcastDownloadEmitter, DownloadEventEmitterPort};
pub use download_manager::{DownloadManagerConfig, DownloadManagerPort};
pub use platform::{PlatformClientPort, PlatformError};
pub use settings_provider::{SettingsProvider, StaticSettings};
pub use thumbnail_fetcher::ThumbnailFetcherPort;

/// Umbrella over the domain errors.
///
/// Hosts convert whatever a component returned into this and map it once
/// (CLI exit codes, UI messages).
#[derive(Debug, Error)]
pub enum CoreError {
    /// Cache operation failed.
    #[error(transparent)]
    Cache(#[from] crate::cache::CacheError),

    /// Download operation failed.
    #[error(transparent)]
    Download(#[from] crate::download::DownloadError),

    /// Platform client failed.
    #[error(transparent)]
    Platform(#[from] PlatformError),

    /// Settings validation error.
    #[error(transparent)]
    Settings(#[from] crate::settings::SettingsError),

    /// Path resolution error.
    #[error(transparent)]
    Path(#[from] crate::paths::PathError),
}
