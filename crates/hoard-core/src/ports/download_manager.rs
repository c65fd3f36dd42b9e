//! Download manager port definition.
//!
//! This port defines the public interface of the download subsystem. It hides
//! cancellation tokens, worker tasks and partial files behind a small async
//! API. Job-control calls on unknown ids return `false`/`None` rather than an
//! error so call sites can treat them uniformly.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;

use crate::download::{DownloadError, DownloadJob, JobId};
use crate::media::MediaItem;
use crate::settings::{
    DEFAULT_DOWNLOAD_CONCURRENCY, DEFAULT_PROGRESS_INTERVAL_MS, MAX_DOWNLOAD_CONCURRENCY, Settings,
};

/// Suffix appended to the final path while a transfer is in progress.
pub const DEFAULT_PART_SUFFIX: &str = ".part";

/// Configuration for creating a download manager.
#[derive(Debug, Clone)]
pub struct DownloadManagerConfig {
    /// Maximum concurrent transfers (worker pool size).
    pub max_concurrent: usize,
    /// Minimum interval between progress events for one job.
    pub progress_interval: Duration,
    /// Suffix for in-progress files.
    pub part_suffix: String,
}

impl Default for DownloadManagerConfig {
    fn default() -> Self {
        Self {
            max_concurrent: DEFAULT_DOWNLOAD_CONCURRENCY as usize,
            progress_interval: Duration::from_millis(DEFAULT_PROGRESS_INTERVAL_MS),
            part_suffix: DEFAULT_PART_SUFFIX.to_string(),
        }
    }
}

impl DownloadManagerConfig {
    /// Build a config from user settings, falling back to defaults.
    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        let defaults = Self::default();
        Self {
            max_concurrent: settings
                .download_concurrency
                .map_or(defaults.max_concurrent, |n| {
                    n.clamp(1, MAX_DOWNLOAD_CONCURRENCY) as usize
                }),
            progress_interval: settings
                .progress_interval_ms
                .map_or(defaults.progress_interval, Duration::from_millis),
            part_suffix: defaults.part_suffix,
        }
    }

    /// Set the maximum concurrent transfers (at least 1).
    #[must_use]
    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent = max.max(1);
        self
    }

    /// Set the progress event interval.
    #[must_use]
    pub const fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }

    /// Set the in-progress file suffix.
    #[must_use]
    pub fn with_part_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.part_suffix = suffix.into();
        self
    }
}

/// Port for managing downloads.
///
/// # Usage
///
/// ```ignore
/// let manager: Arc<dyn DownloadManagerPort> = /* ... */;
///
/// let id = manager.queue_download(item, PathBuf::from("D")).await?;
/// manager.pause(id).await;
/// manager.resume(id).await;
/// let job = manager.get_job(id).await;
/// ```
#[async_trait]
pub trait DownloadManagerPort: Send + Sync {
    /// Queue a single download. Returns immediately; never waits on the
    /// network.
    async fn queue_download(
        &self,
        item: MediaItem,
        destination: PathBuf,
    ) -> Result<JobId, DownloadError>;

    /// Queue a group of downloads under one aggregate job.
    ///
    /// Returns the child ids in item order. The aggregate id is the
    /// `parent_id` of any child.
    async fn queue_multiple_downloads(
        &self,
        items: Vec<MediaItem>,
        destination: PathBuf,
        group_type: Option<String>,
    ) -> Result<Vec<JobId>, DownloadError>;

    /// Snapshot of every job, ordered by sequence.
    async fn get_jobs(&self) -> Vec<DownloadJob>;

    /// Snapshot of one job.
    async fn get_job(&self, id: JobId) -> Option<DownloadJob>;

    /// Pause a queued or downloading job.
    async fn pause(&self, id: JobId) -> bool;

    /// Put a paused job back into the queue.
    async fn resume(&self, id: JobId) -> bool;

    /// Cancel a non-terminal job.
    async fn cancel(&self, id: JobId) -> bool;

    /// Re-queue a failed job.
    async fn retry(&self, id: JobId) -> bool;

    /// Remove a terminal job (an aggregate takes its children with it).
    async fn purge(&self, id: JobId) -> bool;

    /// Remove every terminal job. Returns how many records were removed.
    async fn purge_finished(&self) -> usize;

    /// Cancel every non-terminal job. Returns how many leaf jobs changed.
    async fn cancel_all(&self) -> usize;

    /// Number of jobs currently transferring.
    async fn active_count(&self) -> usize;

    /// Number of leaf jobs waiting for a worker slot.
    async fn pending_count(&self) -> usize;
}
