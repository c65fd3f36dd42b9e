//! Download manager for hoard.
//!
//! Queues single items or whole groups (pools, favourites, search results),
//! runs a bounded number of transfers at once, and reports every change as a
//! `DownloadEvent`. Transfers write to a part file and resume from it after
//! a pause or a failure.
//!
//! # Modules
//!
//! - `queue` - Pure job table state machine
//! - `progress` - Progress rate-limiting
//! - `manager` - `DownloadManagerPort` implementation, worker and paths

// Re-export core types for convenience
pub use hoard_core::download::{
    AggregateProgress, DownloadError, DownloadEvent, DownloadJob, JobId, JobStatus, Sequence,
};
pub use hoard_core::ports::{
    ByteSourcePort, DownloadEventEmitterPort, DownloadManagerConfig, DownloadManagerPort,
    PlatformClientPort,
};

// Internal modules (pub(crate) to keep implementation private)
pub(crate) mod progress;
pub(crate) mod queue;

// Re-export progress throttle for consumers (adapters)
pub use progress::ProgressThrottle;

// Public API - download manager
mod manager;

pub use manager::{
    CompletedTransfer, DownloadDestination, DownloadManagerDeps, DownloadManagerImpl,
    ProgressUpdate, TransferJob, build_download_manager,
};
