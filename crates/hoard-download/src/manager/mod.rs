//! Download manager implementation.
//!
//! This module provides the concrete implementation of `DownloadManagerPort`
//! with a long-lived runner, lease-based state management, and clean
//! separation between the worker (byte transfer) and the manager (job table
//! and events).
//!
//! # Architecture
//!
//! - **Manager**: owns the job table, leases and worker slots
//! - **Worker**: streams one resource to disk, writes only to a `watch::Sender`
//! - **Progress bridge**: reads the watch channel and applies throttled
//!   progress to the table
//!
//! # Concurrency Model
//!
//! - Single long-lived runner (never resets `runner_started`)
//! - `Notify` for wake-on-work, a `Semaphore` for the worker slots
//! - Lease tokens prevent stale finalize commits
//! - Lock order: table → active (consistent everywhere)
//! - Events are emitted while the table lock is held, so subscribers see
//!   them in the order the table changed

mod paths;
mod worker;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify, RwLock, Semaphore, watch};
use tokio_util::sync::CancellationToken;

use hoard_core::{
    ByteSourcePort, DownloadError, DownloadEvent, DownloadEventEmitterPort, DownloadJob,
    DownloadManagerConfig, DownloadManagerPort, JobId, JobStatus, MediaItem, PlatformClientPort,
};

use crate::progress::ProgressThrottle;
use crate::queue::{JobChange, JobTable, LeafSpec};

pub use paths::DownloadDestination;
pub use worker::{CompletedTransfer, ProgressUpdate, TransferJob};

/// Lease ID for tracking active transfers.
///
/// Used to prevent stale finalize commits when a job is paused and resumed
/// while its previous execution is still winding down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct LeaseId(u64);

/// State for an active transfer.
struct ActiveJob {
    /// Unique lease for this execution.
    lease: LeaseId,
    /// Cancellation token (child of the manager's shutdown token).
    cancel: CancellationToken,
}

/// A job taken off the table by the runner.
struct StartedJob {
    id: JobId,
    lease: LeaseId,
    item: MediaItem,
    output_path: PathBuf,
    cancel: CancellationToken,
}

/// Dependencies for creating a download manager.
///
/// This struct bundles all the ports and configuration needed
/// to construct a `DownloadManagerImpl`.
pub struct DownloadManagerDeps<P, B, E>
where
    P: PlatformClientPort + 'static,
    B: ByteSourcePort + 'static,
    E: DownloadEventEmitterPort + 'static,
{
    /// Resolves download URLs for items without a direct file URL.
    pub platform: Arc<P>,
    /// Opens remote resources for streaming.
    pub byte_source: Arc<B>,
    /// Port for emitting download events.
    pub event_emitter: Arc<E>,
    /// Configuration for the download manager.
    pub config: DownloadManagerConfig,
}

/// Build a download manager from its dependencies.
///
/// The returned handle can be stored as `Arc<dyn DownloadManagerPort>`.
/// The runner is started lazily by the first queued job.
pub fn build_download_manager<P, B, E>(
    deps: DownloadManagerDeps<P, B, E>,
) -> Arc<DownloadManagerImpl>
where
    P: PlatformClientPort + 'static,
    B: ByteSourcePort + 'static,
    E: DownloadEventEmitterPort + 'static,
{
    let slots = deps.config.max_concurrent.max(1);
    Arc::new_cyclic(|me| DownloadManagerImpl {
        me: me.clone(),
        platform: deps.platform,
        byte_source: deps.byte_source,
        event_emitter: deps.event_emitter,
        config: deps.config,
        table: RwLock::new(JobTable::new()),
        active: Mutex::new(HashMap::new()),
        slots: Arc::new(Semaphore::new(slots)),
        slot_count: slots,
        lease_counter: AtomicU64::new(0),
        queue_notify: Notify::new(),
        runner_started: AtomicBool::new(false),
        shutdown: CancellationToken::new(),
    })
}

/// Concrete implementation of the download manager.
///
/// Adapters should typically hold `Arc<dyn DownloadManagerPort>` instead of
/// depending on this type directly.
pub struct DownloadManagerImpl {
    /// Handle to ourselves for spawning the runner from `&self` methods.
    me: Weak<Self>,
    platform: Arc<dyn PlatformClientPort>,
    byte_source: Arc<dyn ByteSourcePort>,
    event_emitter: Arc<dyn DownloadEventEmitterPort>,
    config: DownloadManagerConfig,
    /// Every job record.
    table: RwLock<JobTable>,
    /// Active transfers keyed by job id.
    /// Lock order: always acquire the table lock before the active lock.
    active: Mutex<HashMap<JobId, ActiveJob>>,
    /// One permit per concurrent transfer.
    slots: Arc<Semaphore>,
    slot_count: usize,
    /// Counter for generating lease IDs.
    lease_counter: AtomicU64,
    /// Notifier for waking the runner when work is available.
    queue_notify: Notify,
    /// Whether the runner has been started (never reset).
    runner_started: AtomicBool,
    /// Parent of every transfer's cancellation token.
    shutdown: CancellationToken,
}

impl DownloadManagerImpl {
    /// Ensure the runner is started.
    ///
    /// Idempotent; the runner lives until `shutdown`.
    fn ensure_runner(&self) {
        if self
            .runner_started
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            if let Some(manager) = self.me.upgrade() {
                tokio::spawn(manager.run_loop());
            }
        }
    }

    /// The main runner loop.
    ///
    /// Takes a worker slot, then the next queued job. Waits on
    /// `queue_notify` when there is no work.
    async fn run_loop(self: Arc<Self>) {
        tracing::debug!(target: "hoard.download", slots = self.slot_count, "Download runner started");
        loop {
            let permit = tokio::select! {
                biased;
                () = self.shutdown.cancelled() => break,
                permit = Arc::clone(&self.slots).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            if let Some(started) = self.next_job().await {
                let manager = Arc::clone(&self);
                tokio::spawn(async move {
                    manager.execute(started).await;
                    drop(permit);
                });
            } else {
                drop(permit);
                tokio::select! {
                    biased;
                    () = self.shutdown.cancelled() => break,
                    () = self.queue_notify.notified() => {}
                }
            }
        }
        tracing::debug!(target: "hoard.download", "Download runner stopped");
    }

    /// Take the lowest-sequence queued leaf and lease it.
    ///
    /// Lock order: table → active.
    async fn next_job(&self) -> Option<StartedJob> {
        if self.shutdown.is_cancelled() {
            return None;
        }

        let mut table = self.table.write().await;
        let mut active = self.active.lock().await;

        let id = table.next_ready(|id| !active.contains_key(&id))?;
        let planned = table
            .get(id)
            .and_then(|job| Some((job.item.clone()?, job.output_path.clone()?)));
        let Some((item, output_path)) = planned else {
            let changes = table.mark_failed(id, "Job has no media item".to_string(), 0);
            self.emit_changes(&table, &changes);
            return None;
        };

        let changes = table.mark_started(id);
        let lease = LeaseId(self.lease_counter.fetch_add(1, Ordering::Relaxed));
        let cancel = self.shutdown.child_token();
        active.insert(
            id,
            ActiveJob {
                lease,
                cancel: cancel.clone(),
            },
        );
        self.emit_changes(&table, &changes);

        tracing::debug!(target: "hoard.download", id = %id, lease = lease.0, "Job started");
        Some(StartedJob {
            id,
            lease,
            item,
            output_path,
            cancel,
        })
    }

    /// Run one leased job and commit its outcome.
    async fn execute(&self, started: StartedJob) {
        let StartedJob {
            id,
            lease,
            item,
            output_path,
            cancel,
        } = started;

        let destination = DownloadDestination::for_output(output_path, &self.config.part_suffix);
        let (progress_tx, progress_rx) = watch::channel(ProgressUpdate::default());

        let transfer = {
            let destination = destination.clone();
            async move {
                let url = self.resolve_url(&item, &cancel).await?;
                let job = TransferJob {
                    id,
                    url,
                    destination,
                    cancel,
                    progress_tx,
                };
                worker::run_transfer(job, self.byte_source.as_ref()).await
            }
        };

        let ((), result) = tokio::join!(self.progress_bridge(id, progress_rx), transfer);
        self.finalize_job(id, lease, &destination, result).await;

        // Keep draining if more work
        self.queue_notify.notify_one();
    }

    /// Direct file URL of the item, else whatever the platform resolves.
    async fn resolve_url(
        &self,
        item: &MediaItem,
        cancel: &CancellationToken,
    ) -> Result<String, DownloadError> {
        if let Some(url) = item.file_url.as_deref().filter(|url| !url.is_empty()) {
            return Ok(url.to_string());
        }

        let resolved = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(DownloadError::Cancelled),
            resolved = self.platform.get_download_url(&item.id) => resolved,
        };

        match resolved {
            Ok(Some(url)) => Ok(url),
            Ok(None) => Err(DownloadError::url_unavailable(item.id.clone())),
            Err(e) => Err(DownloadError::network(e.to_string())),
        }
    }

    /// Apply worker progress to the table at most once per interval.
    ///
    /// An update held back by the throttle is applied once the window
    /// reopens. Returns after the worker drops its sender, flushing the last
    /// update.
    async fn progress_bridge(&self, id: JobId, mut rx: watch::Receiver<ProgressUpdate>) {
        let mut throttle = ProgressThrottle::new(self.config.progress_interval);
        let mut last_seq = 0u64;

        loop {
            let pending = rx.borrow().seq > last_seq;
            tokio::select! {
                changed = rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                () = tokio::time::sleep(throttle.remaining()), if pending => {}
            }
            if rx.borrow().seq > last_seq && throttle.should_emit() {
                last_seq = self.apply_progress(id, &rx, last_seq).await;
            }
        }

        self.apply_progress(id, &rx, last_seq).await;
    }

    async fn apply_progress(
        &self,
        id: JobId,
        rx: &watch::Receiver<ProgressUpdate>,
        last_seq: u64,
    ) -> u64 {
        let update = rx.borrow().clone();
        if update.seq <= last_seq {
            return last_seq;
        }

        let mut table = self.table.write().await;
        let changes = table.record_progress(id, update.downloaded, update.total);
        self.emit_changes(&table, &changes);
        update.seq
    }

    /// Commit the outcome of an execution.
    ///
    /// Verifies the lease to prevent stale commits. The job's current status
    /// decides what a cancelled transfer means. A body that lands after the
    /// job was paused is moved back to the part file, so the job stays
    /// `Paused` and a later resume finishes it from the full offset.
    async fn finalize_job(
        &self,
        id: JobId,
        lease: LeaseId,
        destination: &DownloadDestination,
        result: Result<CompletedTransfer, DownloadError>,
    ) {
        let mut table = self.table.write().await;
        if !self.verify_and_remove_lease(id, lease).await {
            tracing::debug!(target: "hoard.download", id = %id, "Ignoring stale finalize (lease mismatch)");
            return;
        }

        let status = table.get(id).map(|job| job.status);
        let cancelled = matches!(status, None | Some(JobStatus::Cancelled));

        let changes = match result {
            Ok(done) if cancelled => {
                // The body landed after the job was cancelled.
                remove_file_quietly(&done.path).await;
                table.set_bytes(id, 0)
            }
            Ok(done) if status == Some(JobStatus::Paused) => {
                let bytes = match tokio::fs::rename(&done.path, &destination.part_path).await {
                    Ok(()) => done.bytes,
                    Err(e) => {
                        tracing::warn!(target: "hoard.download", id = %id, error = %e, "Failed to park finished body");
                        destination.part_len().await
                    }
                };
                tracing::debug!(target: "hoard.download", id = %id, bytes, "Body finished after pause");
                table.set_bytes(id, bytes)
            }
            Ok(done) => {
                tracing::info!(
                    target: "hoard.download",
                    id = %id,
                    bytes = done.bytes,
                    path = %done.path.display(),
                    "Download completed"
                );
                table.mark_completed(id, done.bytes, done.path)
            }
            Err(DownloadError::Cancelled) if cancelled => {
                destination.remove_part().await;
                table.set_bytes(id, 0)
            }
            Err(DownloadError::Cancelled) if status == Some(JobStatus::Downloading) => {
                let bytes = destination.part_len().await;
                tracing::info!(target: "hoard.download", id = %id, bytes, "Download interrupted by shutdown");
                let error = DownloadError::Interrupted {
                    bytes_downloaded: bytes,
                };
                table.mark_failed(id, error.user_message(), bytes)
            }
            Err(DownloadError::Cancelled) => {
                let bytes = destination.part_len().await;
                tracing::debug!(target: "hoard.download", id = %id, bytes, "Download paused");
                table.set_bytes(id, bytes)
            }
            Err(e) => {
                let bytes = destination.part_len().await;
                tracing::warn!(target: "hoard.download", id = %id, error = %e, "Download failed");
                table.mark_failed(id, e.user_message(), bytes)
            }
        };

        self.emit_changes(&table, &changes);
    }

    /// Verify lease matches and remove from active map.
    async fn verify_and_remove_lease(&self, id: JobId, lease: LeaseId) -> bool {
        let mut active = self.active.lock().await;
        active
            .get(&id)
            .is_some_and(|job| job.lease == lease)
            .then(|| active.remove(&id))
            .is_some()
    }

    /// Turn table changes into events, in order, with fresh snapshots.
    fn emit_changes(&self, table: &JobTable, changes: &[JobChange]) {
        for change in changes {
            let Some(job) = table.get(change.id()) else {
                continue;
            };
            let job = job.clone();
            let event = match *change {
                JobChange::Added(_) => DownloadEvent::added(job),
                JobChange::Status { previous, .. } => DownloadEvent::status_changed(job, previous),
                JobChange::Progress(_) => DownloadEvent::progress(job),
            };
            self.event_emitter.emit(event);
        }
    }

    /// Cancel the tokens of active leaves whose status just changed.
    ///
    /// Returns the destinations of affected leaves with no active transfer.
    async fn interrupt(&self, table: &JobTable, changes: &[JobChange]) -> Vec<DownloadDestination> {
        let active = self.active.lock().await;
        let mut idle = Vec::new();
        for id in changes.iter().filter_map(JobChange::status_id) {
            if let Some(job) = active.get(&id) {
                job.cancel.cancel();
            } else if let Some(output) = table
                .get(id)
                .filter(|job| !job.is_aggregate)
                .and_then(|job| job.output_path.clone())
            {
                idle.push(DownloadDestination::for_output(output, &self.config.part_suffix));
            }
        }
        idle
    }

    /// Shared body of `cancel` and `cancel_all`. Returns the leaf changes.
    async fn cancel_with<F>(&self, op: F) -> usize
    where
        F: FnOnce(&mut JobTable) -> Vec<JobChange>,
    {
        let (cancelled, idle) = {
            let mut table = self.table.write().await;
            let changes = op(&mut *table);
            let idle = self.interrupt(&table, &changes).await;
            self.emit_changes(&table, &changes);
            let cancelled = changes
                .iter()
                .filter_map(JobChange::status_id)
                .filter(|id| table.get(*id).is_some_and(|job| !job.is_aggregate))
                .count();
            (cancelled, idle)
        };

        // Paused or queued leaves have no worker to clean up after them.
        for destination in idle {
            destination.remove_part().await;
        }
        cancelled
    }

    /// Shared body of `resume` and `retry`.
    async fn requeue_with<F>(&self, op: F) -> bool
    where
        F: FnOnce(&mut JobTable) -> Vec<JobChange>,
    {
        {
            let mut table = self.table.write().await;
            let changes = op(&mut *table);
            if changes.is_empty() {
                return false;
            }
            self.emit_changes(&table, &changes);
        }
        self.queue_notify.notify_one();
        self.ensure_runner();
        true
    }

    fn reject_if_shutting_down(&self) -> Result<(), DownloadError> {
        if self.shutdown.is_cancelled() {
            tracing::warn!(target: "hoard.download", "Rejecting download: manager is shutting down");
            return Err(DownloadError::ShuttingDown);
        }
        Ok(())
    }

    /// Stop the runner, interrupt every transfer and wait for the workers to
    /// commit their outcome.
    ///
    /// Interrupted transfers end up `Failed` with their partial bytes kept,
    /// so a later `retry` resumes them. Queued jobs stay queued.
    pub async fn shutdown(&self) {
        if self.shutdown.is_cancelled() {
            return;
        }
        self.shutdown.cancel();
        self.queue_notify.notify_waiters();

        let slots = u32::try_from(self.slot_count).unwrap_or(u32::MAX);
        if let Ok(permits) = self.slots.acquire_many(slots).await {
            drop(permits);
        }
        self.slots.close();
        tracing::info!(target: "hoard.download", "Download manager shut down");
    }
}

async fn remove_file_quietly(path: &std::path::Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(target: "hoard.download", path = %path.display(), error = %e, "Failed to remove file");
        }
    }
}

#[async_trait]
impl DownloadManagerPort for DownloadManagerImpl {
    async fn queue_download(
        &self,
        item: MediaItem,
        destination: PathBuf,
    ) -> Result<JobId, DownloadError> {
        self.reject_if_shutting_down()?;

        let output = DownloadDestination::plan(&destination, &item, &self.config.part_suffix);
        let id = {
            let mut table = self.table.write().await;
            let (id, changes) = table
                .insert_single(item, destination, output.output_path)
                .inspect_err(|e| {
                    tracing::warn!(target: "hoard.download", error = %e, "Rejecting duplicate download");
                })?;
            self.emit_changes(&table, &changes);
            id
        };

        tracing::info!(target: "hoard.download", id = %id, "Download queued");
        self.queue_notify.notify_one();
        self.ensure_runner();
        Ok(id)
    }

    async fn queue_multiple_downloads(
        &self,
        items: Vec<MediaItem>,
        destination: PathBuf,
        group_type: Option<String>,
    ) -> Result<Vec<JobId>, DownloadError> {
        self.reject_if_shutting_down()?;
        if items.is_empty() {
            return Ok(Vec::new());
        }

        let leaves: Vec<LeafSpec> = items
            .into_iter()
            .map(|item| {
                let output =
                    DownloadDestination::plan(&destination, &item, &self.config.part_suffix);
                (item, output.output_path)
            })
            .collect();

        let inserted = {
            let mut table = self.table.write().await;
            let inserted = table
                .insert_group(leaves, destination, group_type)
                .inspect_err(|e| {
                    tracing::warn!(target: "hoard.download", error = %e, "Rejecting duplicate download group");
                })?;
            if let Some((_, _, changes)) = &inserted {
                self.emit_changes(&table, changes);
            }
            inserted
        };

        let Some((parent, children, _)) = inserted else {
            return Ok(Vec::new());
        };

        tracing::info!(
            target: "hoard.download",
            id = %parent,
            children = children.len(),
            "Download group queued"
        );
        self.queue_notify.notify_one();
        self.ensure_runner();
        Ok(children)
    }

    async fn get_jobs(&self) -> Vec<DownloadJob> {
        self.table.read().await.snapshot()
    }

    async fn get_job(&self, id: JobId) -> Option<DownloadJob> {
        self.table.read().await.get(id).cloned()
    }

    async fn pause(&self, id: JobId) -> bool {
        let mut table = self.table.write().await;
        let changes = table.pause(id);
        if changes.is_empty() {
            return false;
        }
        // Paused leaves keep their part file for resume.
        self.interrupt(&table, &changes).await;
        self.emit_changes(&table, &changes);
        tracing::info!(target: "hoard.download", id = %id, "Download paused");
        true
    }

    async fn resume(&self, id: JobId) -> bool {
        let resumed = self.requeue_with(|table| table.resume(id)).await;
        if resumed {
            tracing::info!(target: "hoard.download", id = %id, "Download resumed");
        }
        resumed
    }

    async fn cancel(&self, id: JobId) -> bool {
        let cancelled = self.cancel_with(|table| table.cancel(id)).await > 0;
        if cancelled {
            tracing::info!(target: "hoard.download", id = %id, "Download cancelled");
        }
        cancelled
    }

    async fn retry(&self, id: JobId) -> bool {
        let retried = self.requeue_with(|table| table.retry(id)).await;
        if retried {
            tracing::info!(target: "hoard.download", id = %id, "Download retried");
        }
        retried
    }

    async fn purge(&self, id: JobId) -> bool {
        let removed = self.table.write().await.purge(id);
        if removed.is_empty() {
            return false;
        }
        tracing::debug!(target: "hoard.download", id = %id, removed = removed.len(), "Jobs purged");
        self.event_emitter.emit(DownloadEvent::purged(removed));
        true
    }

    async fn purge_finished(&self) -> usize {
        let removed = self.table.write().await.purge_finished();
        let count = removed.len();
        if count > 0 {
            tracing::debug!(target: "hoard.download", removed = count, "Finished jobs purged");
            self.event_emitter.emit(DownloadEvent::purged(removed));
        }
        count
    }

    async fn cancel_all(&self) -> usize {
        let count = self.cancel_with(JobTable::cancel_all).await;
        tracing::info!(target: "hoard.download", count, "Cancelled all downloads");
        count
    }

    async fn active_count(&self) -> usize {
        self.active.lock().await.len()
    }

    async fn pending_count(&self) -> usize {
        self.table.read().await.pending_len()
    }
}
