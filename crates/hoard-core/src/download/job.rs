//! The `DownloadJob` record and its status machine.
//!
//! Leaf jobs move through
//! `Queued → Downloading → {Completed | Failed}`, may be paused from
//! `Queued`/`Downloading` and resumed back into `Queued`, cancelled from any
//! non-terminal state, and retried from `Failed`. `Completed` and `Cancelled`
//! are terminal.
//!
//! Aggregate jobs never transition through download activity; their status
//! and byte counts are derived from their children with
//! [`derive_aggregate_status`] and [`AggregateProgress`].

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::types::{JobId, Sequence};
use crate::media::MediaItem;

/// Status of a download job.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Waiting for a worker slot.
    Queued,
    /// A worker is transferring bytes.
    Downloading,
    /// Finished successfully.
    Completed,
    /// Transfer failed; may be retried.
    Failed,
    /// Paused by the user; excluded from dispatch until resumed.
    Paused,
    /// Cancelled by the user.
    Cancelled,
}

impl JobStatus {
    /// String form for logs and wire formats.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Downloading => "downloading",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Paused => "paused",
            Self::Cancelled => "cancelled",
        }
    }

    /// Parse from string representation; unknown values map to `Queued`.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "downloading" => Self::Downloading,
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            "paused" => Self::Paused,
            "cancelled" => Self::Cancelled,
            _ => Self::Queued,
        }
    }

    /// `Completed` and `Cancelled` accept no further transitions.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Still expected to make progress without a user action on it
    /// (`Queued`, `Downloading`, `Paused`).
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Queued | Self::Downloading | Self::Paused)
    }

    /// Whether the job has settled (terminal, or failed and awaiting retry).
    #[must_use]
    pub const fn is_settled(self) -> bool {
        !self.is_active()
    }

    /// Pause is legal from `Queued` and `Downloading`.
    #[must_use]
    pub const fn can_pause(self) -> bool {
        matches!(self, Self::Queued | Self::Downloading)
    }

    /// Resume is legal only from `Paused`.
    #[must_use]
    pub const fn can_resume(self) -> bool {
        matches!(self, Self::Paused)
    }

    /// Cancel is legal from any non-terminal state.
    #[must_use]
    pub const fn can_cancel(self) -> bool {
        !self.is_terminal()
    }

    /// Retry is legal only from `Failed`.
    #[must_use]
    pub const fn can_retry(self) -> bool {
        matches!(self, Self::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A download job snapshot.
///
/// Values handed out by the manager are copies; they do not track later
/// changes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadJob {
    /// Unique job identifier.
    pub id: JobId,
    /// Stable queue order assigned at creation.
    pub sequence: Sequence,
    /// The media item being fetched (`None` for aggregate jobs).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item: Option<MediaItem>,
    /// Destination directory requested by the caller.
    pub destination: PathBuf,
    /// Planned final file path (`None` for aggregate jobs).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,
    /// Whether this is a synthetic group job.
    pub is_aggregate: bool,
    /// Owning aggregate, set only on children.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<JobId>,
    /// Ordered child ids, populated only on aggregate jobs.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children_ids: Vec<JobId>,
    /// Free-form grouping tag (e.g. "pool").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_type: Option<String>,
    /// Bytes written so far.
    pub bytes_downloaded: u64,
    /// Total size in bytes, 0 until known.
    pub total_bytes: u64,
    /// Current status.
    pub status: JobStatus,
    /// Creation time.
    pub queued_at: DateTime<Utc>,
    /// Time of the last transition into `Downloading`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// Time of the transition into `Completed`, `Failed` or `Cancelled`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Error message of the last failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Number of explicit retries.
    pub retry_count: u32,
}

impl DownloadJob {
    /// Create a queued leaf job.
    pub fn new_leaf(
        id: JobId,
        sequence: Sequence,
        item: MediaItem,
        destination: PathBuf,
        output_path: PathBuf,
    ) -> Self {
        Self {
            id,
            sequence,
            item: Some(item),
            destination,
            output_path: Some(output_path),
            is_aggregate: false,
            parent_id: None,
            children_ids: Vec::new(),
            group_type: None,
            bytes_downloaded: 0,
            total_bytes: 0,
            status: JobStatus::Queued,
            queued_at: Utc::now(),
            started_at: None,
            completed_at: None,
            error_message: None,
            retry_count: 0,
        }
    }

    /// Create a queued aggregate job with no children yet.
    pub fn new_aggregate(
        id: JobId,
        sequence: Sequence,
        destination: PathBuf,
        group_type: Option<String>,
    ) -> Self {
        Self {
            id,
            sequence,
            item: None,
            destination,
            output_path: None,
            is_aggregate: true,
            parent_id: None,
            children_ids: Vec::new(),
            group_type,
            bytes_downloaded: 0,
            total_bytes: 0,
            status: JobStatus::Queued,
            queued_at: Utc::now(),
            started_at: None,
            completed_at: None,
            error_message: None,
            retry_count: 0,
        }
    }

    /// Progress in percent (0 when the total is unknown).
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn progress_percent(&self) -> f64 {
        if self.total_bytes == 0 {
            return 0.0;
        }
        ((self.bytes_downloaded as f64 / self.total_bytes as f64) * 100.0).min(100.0)
    }

    /// Whether the job can no longer change.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Whether this job is a child of an aggregate.
    #[must_use]
    pub const fn is_child(&self) -> bool {
        self.parent_id.is_some()
    }

    /// Short human-readable label.
    pub fn display_name(&self) -> String {
        match (&self.item, &self.group_type) {
            (Some(item), _) => item
                .title
                .clone()
                .unwrap_or_else(|| format!("{}:{}", item.source, item.id)),
            (None, Some(group)) => format!("{group} ({} items)", self.children_ids.len()),
            (None, None) => format!("group ({} items)", self.children_ids.len()),
        }
    }

    /// Add a child id, keeping the list free of duplicates.
    pub fn push_child(&mut self, child: JobId) {
        if !self.children_ids.contains(&child) {
            self.children_ids.push(child);
        }
    }
}

/// Summed byte counts of an aggregate's children.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AggregateProgress {
    /// Sum of children's `bytes_downloaded`.
    pub bytes_downloaded: u64,
    /// Sum of children's known `total_bytes` (unknown totals add 0).
    pub total_bytes: u64,
}

impl AggregateProgress {
    /// Sum over the given children.
    pub fn sum<'a, I>(children: I) -> Self
    where
        I: IntoIterator<Item = &'a DownloadJob>,
    {
        children
            .into_iter()
            .fold(Self::default(), |acc, child| Self {
                bytes_downloaded: acc.bytes_downloaded.saturating_add(child.bytes_downloaded),
                total_bytes: acc.total_bytes.saturating_add(child.total_bytes),
            })
    }
}

/// Derive an aggregate's status from its children's statuses.
///
/// - `Completed` iff every child is `Completed`
/// - `Cancelled` iff every child is `Cancelled`
/// - `Downloading` if any child is `Downloading`
/// - `Failed` if at least one child failed and none is still active
/// - `Completed` when every child settled as `Completed` or `Cancelled`
/// - otherwise `Queued` or `Paused` by majority of `Queued`/`Paused`
///   children, ties going to `Queued`
pub fn derive_aggregate_status<I>(children: I) -> JobStatus
where
    I: IntoIterator<Item = JobStatus>,
{
    let mut total = 0usize;
    let (mut completed, mut cancelled, mut failed) = (0usize, 0usize, 0usize);
    let (mut downloading, mut queued, mut paused) = (0usize, 0usize, 0usize);

    for status in children {
        total += 1;
        match status {
            JobStatus::Completed => completed += 1,
            JobStatus::Cancelled => cancelled += 1,
            JobStatus::Failed => failed += 1,
            JobStatus::Downloading => downloading += 1,
            JobStatus::Queued => queued += 1,
            JobStatus::Paused => paused += 1,
        }
    }

    if total == 0 {
        return JobStatus::Queued;
    }
    if completed == total {
        return JobStatus::Completed;
    }
    if cancelled == total {
        return JobStatus::Cancelled;
    }
    if downloading > 0 {
        return JobStatus::Downloading;
    }

    let active = queued + paused;
    if active == 0 {
        return if failed > 0 {
            JobStatus::Failed
        } else {
            JobStatus::Completed
        };
    }

    if paused > queued {
        JobStatus::Paused
    } else {
        JobStatus::Queued
    }
}
