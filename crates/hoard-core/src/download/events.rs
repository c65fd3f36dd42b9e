//! Download events - discriminated union for all job state changes.
//!
//! Every event carries a full snapshot of the job after the change, so a
//! subscriber never has to call back into the manager to render it.
//!
//! ```typescript
//! type DownloadEvent =
//!   | { type: "job_added"; job: DownloadJob }
//!   | { type: "status_changed"; job: DownloadJob; previous: JobStatus }
//!   | { type: "progress_updated"; job: DownloadJob }
//!   | { type: "jobs_purged"; ids: string[] };
//! ```

use serde::{Deserialize, Serialize};

use super::job::{DownloadJob, JobStatus};
use super::types::JobId;

/// Single discriminated union for all download events.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DownloadEvent {
    /// A job (leaf, aggregate or child) was created.
    JobAdded {
        /// Snapshot of the new job.
        job: DownloadJob,
    },

    /// A job changed status, including synthetic aggregate transitions.
    StatusChanged {
        /// Snapshot after the transition.
        job: DownloadJob,
        /// Status before the transition.
        previous: JobStatus,
    },

    /// A job's byte counts changed.
    ProgressUpdated {
        /// Snapshot carrying the new byte counts.
        job: DownloadJob,
    },

    /// Jobs were removed from the manager.
    JobsPurged {
        /// Removed job ids.
        ids: Vec<JobId>,
    },
}

impl DownloadEvent {
    /// Create a job-added event.
    #[must_use]
    pub const fn added(job: DownloadJob) -> Self {
        Self::JobAdded { job }
    }

    /// Create a status-changed event.
    #[must_use]
    pub const fn status_changed(job: DownloadJob, previous: JobStatus) -> Self {
        Self::StatusChanged { job, previous }
    }

    /// Create a progress event.
    #[must_use]
    pub const fn progress(job: DownloadJob) -> Self {
        Self::ProgressUpdated { job }
    }

    /// Create a purge event.
    #[must_use]
    pub const fn purged(ids: Vec<JobId>) -> Self {
        Self::JobsPurged { ids }
    }

    /// Get the job ID for single-job events.
    #[must_use]
    pub const fn job_id(&self) -> Option<JobId> {
        match self {
            Self::JobAdded { job }
            | Self::StatusChanged { job, .. }
            | Self::ProgressUpdated { job } => Some(job.id),
            Self::JobsPurged { .. } => None,
        }
    }

    /// Get the event name for wire protocols.
    #[must_use]
    pub const fn event_name(&self) -> &'static str {
        match self {
            Self::JobAdded { .. } => "download:job_added",
            Self::StatusChanged { .. } => "download:status_changed",
            Self::ProgressUpdated { .. } => "download:progress",
            Self::JobsPurged { .. } => "download:purged",
        }
    }
}
