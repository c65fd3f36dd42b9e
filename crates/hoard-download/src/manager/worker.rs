//! Download worker pipeline.
//!
//! The worker streams one resource into its part file and renames it into
//! place. It operates on value types only and never touches the job table:
//! progress goes out through a `watch::Sender`, the outcome through the
//! return value.
//!
//! Cancellation is handled with `tokio::select!` around every await that can
//! block on the network. A cancelled transfer flushes what it has and leaves
//! the part file for the manager to keep (pause) or delete (cancel).

use std::path::PathBuf;

use futures_util::StreamExt;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use hoard_core::{ByteSourcePort, DownloadError, JobId};

use super::paths::DownloadDestination;

/// A transfer to be executed by the worker.
pub struct TransferJob {
    /// The job being served.
    pub id: JobId,
    /// Resolved source URL.
    pub url: String,
    /// Planned destination.
    pub destination: DownloadDestination,
    /// Cancellation token for this execution.
    pub cancel: CancellationToken,
    /// Progress sender for this execution.
    pub progress_tx: watch::Sender<ProgressUpdate>,
}

/// Progress update sent through the watch channel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressUpdate {
    /// Bytes on disk so far, including any resumed prefix.
    pub downloaded: u64,
    /// Total bytes, 0 when unknown.
    pub total: u64,
    /// Monotonically increasing sequence number for change detection.
    pub seq: u64,
}

impl ProgressUpdate {
    /// Create a new progress update with a sequence number.
    pub const fn new(downloaded: u64, total: u64, seq: u64) -> Self {
        Self {
            downloaded,
            total,
            seq,
        }
    }
}

/// Result of a successful transfer.
#[derive(Debug, Clone)]
pub struct CompletedTransfer {
    /// Final file path.
    pub path: PathBuf,
    /// Size of the final file.
    pub bytes: u64,
}

/// Run one transfer to completion, cancellation or failure.
pub async fn run_transfer(
    job: TransferJob,
    source: &dyn ByteSourcePort,
) -> Result<CompletedTransfer, DownloadError> {
    let TransferJob {
        id,
        url,
        destination,
        cancel,
        progress_tx,
    } = job;

    destination.ensure_dir().await?;
    let offset = destination.part_len().await;

    let opened = tokio::select! {
        biased;
        () = cancel.cancelled() => return Err(DownloadError::Cancelled),
        opened = source.open(&url, offset) => opened?,
    };

    let resumed = opened.resumed_from;
    let mut file = if resumed == offset && offset > 0 {
        tracing::debug!(target: "hoard.download", id = %id, offset, "Resuming partial file");
        OpenOptions::new()
            .append(true)
            .open(&destination.part_path)
            .await?
    } else if resumed == 0 {
        OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&destination.part_path)
            .await?
    } else {
        return Err(DownloadError::other(format!(
            "Source resumed at byte {resumed}, expected {offset}"
        )));
    };

    let total = opened.total_len.unwrap_or(0);
    let mut downloaded = resumed;
    let mut stream = opened.stream;
    progress_tx.send_modify(|p| {
        p.downloaded = downloaded;
        p.total = total;
        p.seq += 1;
    });

    loop {
        let next = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                file.flush().await?;
                return Err(DownloadError::Cancelled);
            }
            next = stream.next() => next,
        };

        let Some(chunk) = next else { break };
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => {
                file.flush().await?;
                return Err(e);
            }
        };

        file.write_all(&chunk).await?;
        downloaded += chunk.len() as u64;
        progress_tx.send_modify(|p| {
            p.downloaded = downloaded;
            p.total = total.max(downloaded);
            p.seq += 1;
        });
    }

    file.flush().await?;
    file.sync_all().await?;
    drop(file);

    if opened.total_len.is_some_and(|expected| downloaded < expected) {
        return Err(DownloadError::Interrupted {
            bytes_downloaded: downloaded,
        });
    }

    tokio::fs::rename(&destination.part_path, &destination.output_path).await?;
    tracing::debug!(
        target: "hoard.download",
        id = %id,
        bytes = downloaded,
        path = %destination.output_path.display(),
        "Transfer finished"
    );

    Ok(CompletedTransfer {
        path: destination.output_path,
        bytes: downloaded,
    })
}
