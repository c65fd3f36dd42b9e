//! Change records produced by the job table.

use hoard_core::{JobId, JobStatus};

/// A single observable change to the job table.
///
/// The manager turns each record into a `DownloadEvent` carrying a fresh
/// snapshot of the job, in the order the records were produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobChange {
    /// A job was inserted.
    Added(JobId),
    /// A job's status changed from `previous`.
    Status {
        /// Affected job.
        id: JobId,
        /// Status before the change.
        previous: JobStatus,
    },
    /// A job's byte counts changed.
    Progress(JobId),
}

impl JobChange {
    /// The job the change applies to.
    pub const fn id(&self) -> JobId {
        match self {
            Self::Added(id) | Self::Progress(id) | Self::Status { id, .. } => *id,
        }
    }

    /// Id of a job whose status changed.
    pub const fn status_id(&self) -> Option<JobId> {
        match self {
            Self::Status { id, .. } => Some(*id),
            _ => None,
        }
    }
}
