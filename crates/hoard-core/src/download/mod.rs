//! Download domain types, events, errors.
//!
//! This module contains pure data types for the download system. No I/O,
//! networking, or runtime dependencies allowed.
//!
//! # Structure
//!
//! - `types` - Identifiers (`JobId`, `Sequence`)
//! - `job` - The `DownloadJob` record, `JobStatus` and aggregate derivation
//! - `events` - Events emitted by the download manager
//! - `errors` - Error types for download operations

pub mod errors;
pub mod events;
pub mod job;
pub mod types;

// Re-export commonly used types
pub use errors::DownloadError;
pub use events::DownloadEvent;
pub use job::{AggregateProgress, DownloadJob, JobStatus, derive_aggregate_status};
pub use types::{JobId, Sequence};
