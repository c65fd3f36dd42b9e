//! Job table state machine.
//!
//! This module owns every `DownloadJob` record and all of its transitions.
//! No I/O is performed here; the manager handles I/O.
//!
//! # Design
//!
//! - Pure synchronous state machine (no async, no IO, no tracing)
//! - Every mutation returns the [`JobChange`] records it caused, in order
//! - Aggregate jobs are never driven directly: after any child changes, the
//!   parent's status and byte counts are re-derived from its children
//! - Jobs are kept in insertion order, which is also `Sequence` order

mod types;

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::Utc;
use indexmap::IndexMap;

use hoard_core::{
    AggregateProgress, DownloadError, DownloadJob, JobId, JobStatus, MediaItem, Sequence,
    download::derive_aggregate_status,
};

pub use types::JobChange;

/// A leaf to insert: the item and its planned output path.
pub type LeafSpec = (MediaItem, PathBuf);

/// Holds all jobs of one manager.
///
/// This is a sync type with no internal locking; the caller is responsible
/// for synchronization.
#[derive(Debug)]
pub struct JobTable {
    jobs: IndexMap<JobId, DownloadJob>,
    next_sequence: Sequence,
}

impl JobTable {
    pub fn new() -> Self {
        Self {
            jobs: IndexMap::new(),
            next_sequence: Sequence::FIRST,
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn get(&self, id: JobId) -> Option<&DownloadJob> {
        self.jobs.get(&id)
    }

    /// Copies of every job in sequence order.
    pub fn snapshot(&self) -> Vec<DownloadJob> {
        self.jobs.values().cloned().collect()
    }

    /// Number of leaf jobs waiting in `Queued`.
    pub fn pending_len(&self) -> usize {
        self.jobs
            .values()
            .filter(|job| !job.is_aggregate && job.status == JobStatus::Queued)
            .count()
    }

    // --- Insertion ---

    /// Insert a standalone leaf job.
    ///
    /// Fails with `AlreadyQueued` when a non-terminal job already owns
    /// `output_path`.
    pub fn insert_single(
        &mut self,
        item: MediaItem,
        destination: PathBuf,
        output_path: PathBuf,
    ) -> Result<(JobId, Vec<JobChange>), DownloadError> {
        self.check_not_queued(&output_path)?;
        let id = JobId::generate();
        let sequence = self.allocate_sequence();
        self.jobs.insert(
            id,
            DownloadJob::new_leaf(id, sequence, item, destination, output_path),
        );
        Ok((id, vec![JobChange::Added(id)]))
    }

    /// Insert an aggregate job followed by one child per leaf.
    ///
    /// The aggregate takes the lower sequence number. Returns the aggregate
    /// id and the child ids in input order. An empty input inserts nothing.
    ///
    /// The group is rejected as a whole when two of its leaves share an
    /// output path, or when a non-terminal job already owns one of them.
    pub fn insert_group(
        &mut self,
        leaves: Vec<LeafSpec>,
        destination: PathBuf,
        group_type: Option<String>,
    ) -> Result<Option<(JobId, Vec<JobId>, Vec<JobChange>)>, DownloadError> {
        if leaves.is_empty() {
            return Ok(None);
        }
        let mut planned = HashSet::with_capacity(leaves.len());
        for (_, output_path) in &leaves {
            self.check_not_queued(output_path)?;
            if !planned.insert(output_path.as_path()) {
                return Err(DownloadError::already_queued(output_path.display().to_string()));
            }
        }

        let parent_id = JobId::generate();
        let parent_sequence = self.allocate_sequence();
        let mut parent =
            DownloadJob::new_aggregate(parent_id, parent_sequence, destination.clone(), group_type);

        let mut children = Vec::with_capacity(leaves.len());
        for (item, output_path) in leaves {
            let id = JobId::generate();
            let sequence = self.allocate_sequence();
            let mut child =
                DownloadJob::new_leaf(id, sequence, item, destination.clone(), output_path);
            child.parent_id = Some(parent_id);
            child.group_type.clone_from(&parent.group_type);
            parent.push_child(id);
            children.push(child);
        }

        let child_ids: Vec<JobId> = children.iter().map(|c| c.id).collect();
        let mut changes = Vec::with_capacity(child_ids.len() + 1);

        self.jobs.insert(parent_id, parent);
        changes.push(JobChange::Added(parent_id));
        for child in children {
            changes.push(JobChange::Added(child.id));
            self.jobs.insert(child.id, child);
        }

        Ok(Some((parent_id, child_ids, changes)))
    }

    // --- Scheduling ---

    /// Lowest-sequence queued leaf accepted by `eligible`.
    pub fn next_ready<F>(&self, eligible: F) -> Option<JobId>
    where
        F: Fn(JobId) -> bool,
    {
        self.jobs
            .values()
            .find(|job| !job.is_aggregate && job.status == JobStatus::Queued && eligible(job.id))
            .map(|job| job.id)
    }

    /// `Queued -> Downloading`.
    pub fn mark_started(&mut self, id: JobId) -> Vec<JobChange> {
        let mut changes = Vec::new();
        if self.leaf_status(id) == Some(JobStatus::Queued) {
            self.transition(id, JobStatus::Downloading, &mut changes);
            self.refresh_parent_of(id, &mut changes);
        }
        changes
    }

    /// Apply worker progress. Ignored unless the job is `Downloading`.
    pub fn record_progress(&mut self, id: JobId, downloaded: u64, total: u64) -> Vec<JobChange> {
        let mut changes = Vec::new();
        if self.leaf_status(id) == Some(JobStatus::Downloading)
            && self.set_bytes_inner(id, downloaded, Some(total), &mut changes)
        {
            self.refresh_parent_of(id, &mut changes);
        }
        changes
    }

    /// Successful transfer. Ignored for terminal jobs.
    pub fn mark_completed(&mut self, id: JobId, bytes: u64, path: PathBuf) -> Vec<JobChange> {
        let mut changes = Vec::new();
        let Some(job) = self.jobs.get_mut(&id) else {
            return changes;
        };
        if job.is_aggregate || job.status.is_terminal() {
            return changes;
        }

        if let Some(item) = job.item.as_mut() {
            item.local_file_path = Some(path);
        }
        job.error_message = None;
        let total = job.total_bytes.max(bytes);
        self.set_bytes_inner(id, bytes, Some(total), &mut changes);
        self.transition(id, JobStatus::Completed, &mut changes);
        self.refresh_parent_of(id, &mut changes);
        changes
    }

    /// Failed transfer. `bytes` is what remains on disk for a later retry.
    pub fn mark_failed(&mut self, id: JobId, message: String, bytes: u64) -> Vec<JobChange> {
        let mut changes = Vec::new();
        let Some(job) = self.jobs.get_mut(&id) else {
            return changes;
        };
        if job.is_aggregate || !job.status.is_active() {
            return changes;
        }

        job.error_message = Some(message);
        self.set_bytes_inner(id, bytes, None, &mut changes);
        self.transition(id, JobStatus::Failed, &mut changes);
        self.refresh_parent_of(id, &mut changes);
        changes
    }

    /// Record the bytes left on disk after a transfer was interrupted by
    /// pause or cancel. The status is left untouched.
    pub fn set_bytes(&mut self, id: JobId, bytes: u64) -> Vec<JobChange> {
        let mut changes = Vec::new();
        if self.leaf_status(id).is_some() && self.set_bytes_inner(id, bytes, None, &mut changes) {
            self.refresh_parent_of(id, &mut changes);
        }
        changes
    }

    // --- Caller actions ---

    /// `Queued | Downloading -> Paused`.
    pub fn pause(&mut self, id: JobId) -> Vec<JobChange> {
        self.apply(id, |table, leaf, changes| {
            table.leaf_status(leaf).is_some_and(JobStatus::can_pause)
                && table.transition(leaf, JobStatus::Paused, changes)
        })
    }

    /// `Paused -> Queued`.
    pub fn resume(&mut self, id: JobId) -> Vec<JobChange> {
        self.apply(id, |table, leaf, changes| {
            table.leaf_status(leaf).is_some_and(JobStatus::can_resume)
                && table.transition(leaf, JobStatus::Queued, changes)
        })
    }

    /// Any non-terminal state `-> Cancelled`. Byte counts reset to 0.
    pub fn cancel(&mut self, id: JobId) -> Vec<JobChange> {
        self.apply(id, |table, leaf, changes| {
            if !table.leaf_status(leaf).is_some_and(JobStatus::can_cancel) {
                return false;
            }
            table.set_bytes_inner(leaf, 0, None, changes);
            table.transition(leaf, JobStatus::Cancelled, changes)
        })
    }

    /// `Failed -> Queued`, counting the retry and clearing the error.
    pub fn retry(&mut self, id: JobId) -> Vec<JobChange> {
        self.apply(id, |table, leaf, changes| {
            if !table.leaf_status(leaf).is_some_and(JobStatus::can_retry) {
                return false;
            }
            if let Some(job) = table.jobs.get_mut(&leaf) {
                job.retry_count += 1;
                job.error_message = None;
            }
            table.transition(leaf, JobStatus::Queued, changes)
        })
    }

    /// Cancel every top-level job that is not terminal.
    pub fn cancel_all(&mut self) -> Vec<JobChange> {
        let roots: Vec<JobId> = self
            .jobs
            .values()
            .filter(|job| job.parent_id.is_none() && !job.is_terminal())
            .map(|job| job.id)
            .collect();
        roots.into_iter().flat_map(|id| self.cancel(id)).collect()
    }

    /// Remove a terminal job. A child is removed together with its whole
    /// group, and only when the group is terminal too.
    ///
    /// Returns the removed ids, aggregate first.
    pub fn purge(&mut self, id: JobId) -> Vec<JobId> {
        let Some(job) = self.jobs.get(&id) else {
            return Vec::new();
        };
        let root = job.parent_id.unwrap_or(id);
        if !self.jobs.get(&root).is_some_and(DownloadJob::is_terminal) {
            return Vec::new();
        }
        self.remove_tree(root)
    }

    /// Remove every terminal top-level job with its children.
    pub fn purge_finished(&mut self) -> Vec<JobId> {
        let roots: Vec<JobId> = self
            .jobs
            .values()
            .filter(|job| job.parent_id.is_none() && job.is_terminal())
            .map(|job| job.id)
            .collect();
        roots
            .into_iter()
            .flat_map(|id| self.remove_tree(id))
            .collect()
    }

    // --- Private helpers ---

    fn allocate_sequence(&mut self) -> Sequence {
        let sequence = self.next_sequence;
        self.next_sequence = sequence.next();
        sequence
    }

    /// A failed job still owns its part file, so only terminal jobs release
    /// their output path.
    fn check_not_queued(&self, output_path: &Path) -> Result<(), DownloadError> {
        let taken = self.jobs.values().any(|job| {
            !job.is_aggregate && !job.is_terminal() && job.output_path.as_deref() == Some(output_path)
        });
        if taken {
            Err(DownloadError::already_queued(output_path.display().to_string()))
        } else {
            Ok(())
        }
    }

    fn leaf_status(&self, id: JobId) -> Option<JobStatus> {
        self.jobs
            .get(&id)
            .filter(|job| !job.is_aggregate)
            .map(|job| job.status)
    }

    /// Run `op` on a leaf, or on every child of an aggregate, then refresh
    /// the affected aggregate once.
    fn apply<F>(&mut self, id: JobId, op: F) -> Vec<JobChange>
    where
        F: Fn(&mut Self, JobId, &mut Vec<JobChange>) -> bool,
    {
        let mut changes = Vec::new();
        let Some(job) = self.jobs.get(&id) else {
            return changes;
        };

        if job.is_aggregate {
            let children = job.children_ids.clone();
            let mut any = false;
            for child in children {
                any |= op(self, child, &mut changes);
            }
            if any {
                self.refresh_aggregate(id, &mut changes);
            }
        } else if op(self, id, &mut changes) {
            self.refresh_parent_of(id, &mut changes);
        }
        changes
    }

    /// Set the status, stamping timestamps. Returns whether it changed.
    fn transition(&mut self, id: JobId, to: JobStatus, changes: &mut Vec<JobChange>) -> bool {
        let Some(job) = self.jobs.get_mut(&id) else {
            return false;
        };
        let previous = job.status;
        if previous == to {
            return false;
        }

        job.status = to;
        match to {
            JobStatus::Downloading => {
                job.started_at = Some(Utc::now());
                job.completed_at = None;
            }
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled => {
                job.completed_at = Some(Utc::now());
            }
            JobStatus::Queued => job.completed_at = None,
            JobStatus::Paused => {}
        }
        changes.push(JobChange::Status { id, previous });
        true
    }

    fn set_bytes_inner(
        &mut self,
        id: JobId,
        downloaded: u64,
        total: Option<u64>,
        changes: &mut Vec<JobChange>,
    ) -> bool {
        let Some(job) = self.jobs.get_mut(&id) else {
            return false;
        };
        let total = total.unwrap_or(job.total_bytes);
        if job.bytes_downloaded == downloaded && job.total_bytes == total {
            return false;
        }
        job.bytes_downloaded = downloaded;
        job.total_bytes = total;
        changes.push(JobChange::Progress(id));
        true
    }

    fn refresh_parent_of(&mut self, child: JobId, changes: &mut Vec<JobChange>) {
        if let Some(parent) = self.jobs.get(&child).and_then(|job| job.parent_id) {
            self.refresh_aggregate(parent, changes);
        }
    }

    /// Re-derive an aggregate's status and byte counts from its children.
    fn refresh_aggregate(&mut self, id: JobId, changes: &mut Vec<JobChange>) {
        let Some(parent) = self.jobs.get(&id) else {
            return;
        };
        let children: Vec<&DownloadJob> = parent
            .children_ids
            .iter()
            .filter_map(|child| self.jobs.get(child))
            .collect();
        let status = derive_aggregate_status(children.iter().map(|child| child.status));
        let progress = AggregateProgress::sum(children);

        self.set_bytes_inner(
            id,
            progress.bytes_downloaded,
            Some(progress.total_bytes),
            changes,
        );
        self.transition(id, status, changes);
    }

    fn remove_tree(&mut self, root: JobId) -> Vec<JobId> {
        let Some(job) = self.jobs.shift_remove(&root) else {
            return Vec::new();
        };
        let mut removed = vec![root];
        for child in job.children_ids {
            if self.jobs.shift_remove(&child).is_some() {
                removed.push(child);
            }
        }
        removed
    }
}

impl Default for JobTable {
    fn default() -> Self {
        Self::new()
    }
}
