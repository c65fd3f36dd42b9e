//! `hoard download` handler.
//!
//! Queues direct URLs, shows a progress bar per transfer and waits until
//! every queued job has settled. Ctrl-C cancels everything and removes
//! partial files.

use std::collections::HashSet;
use std::path::Path;

use anyhow::Result;
use tokio::sync::broadcast::error::RecvError;

use hoard_core::{DownloadEvent, DownloadJob, DownloadManagerPort, JobId, JobStatus, MediaItem};

use crate::bootstrap::CliContext;
use crate::error::CliError;
use crate::presentation::{DownloadProgress, format_bytes};

/// Source label for items built from bare URLs.
const DIRECT_SOURCE: &str = "direct";

/// Execute the download command.
pub async fn execute(
    ctx: &CliContext,
    urls: &[String],
    dest: &Path,
    group: Option<String>,
) -> Result<()> {
    if dest.exists() && !dest.is_dir() {
        return Err(
            CliError::Arguments(format!("{} is not a directory", dest.display())).into(),
        );
    }

    let items = items_for_urls(urls);
    let manager = &ctx.downloads;

    // Subscribe first so no transition is missed.
    let mut events = ctx.events.subscribe();

    let roots: Vec<JobId> = if group.is_some() {
        let children = manager
            .queue_multiple_downloads(items, dest.to_path_buf(), group)
            .await?;
        match children.first() {
            Some(child) => manager
                .get_job(*child)
                .await
                .and_then(|job| job.parent_id)
                .into_iter()
                .collect(),
            None => Vec::new(),
        }
    } else {
        let mut ids = Vec::with_capacity(items.len());
        for item in items {
            ids.push(manager.queue_download(item, dest.to_path_buf()).await?);
        }
        ids
    };

    let mut progress = DownloadProgress::new();
    progress.println(&format!(
        "Queued {} download(s) into {}",
        urls.len(),
        dest.display()
    ));

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    while !all_settled(manager.as_ref(), &roots).await {
        tokio::select! {
            _ = &mut ctrl_c => {
                let cancelled = manager.cancel_all().await;
                progress.println(&format!("Interrupted, cancelled {cancelled} download(s)"));
                break;
            }
            event = events.recv() => match event {
                Ok(event) => report(&mut progress, &event),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Event subscriber lagged");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }
    progress.clear();

    let failed = count_failed(&manager.get_jobs().await);
    manager.shutdown().await;

    if failed > 0 {
        return Err(CliError::Downloads { failed }.into());
    }
    Ok(())
}

async fn all_settled(manager: &dyn DownloadManagerPort, roots: &[JobId]) -> bool {
    for id in roots {
        if manager
            .get_job(*id)
            .await
            .is_some_and(|job| job.status.is_active())
        {
            return false;
        }
    }
    true
}

fn report(progress: &mut DownloadProgress, event: &DownloadEvent) {
    match event {
        DownloadEvent::ProgressUpdated { job } => progress.update(job),
        DownloadEvent::StatusChanged { job, previous } => {
            let name = job.display_name();
            match job.status {
                JobStatus::Completed => {
                    let size = format_bytes(job.bytes_downloaded);
                    let line = match &job.output_path {
                        Some(path) => format!("✓ {name} ({size}) -> {}", path.display()),
                        None => format!("✓ {name} ({size})"),
                    };
                    progress.finish(job.id, &line);
                }
                JobStatus::Failed => {
                    let reason = job.error_message.as_deref().unwrap_or("failed");
                    progress.finish(job.id, &format!("✗ {name}: {reason}"));
                }
                JobStatus::Cancelled => progress.finish(job.id, &format!("- {name} cancelled")),
                status => {
                    tracing::debug!(job = %name, from = %previous, to = %status, "Status changed");
                }
            }
        }
        DownloadEvent::JobAdded { .. } | DownloadEvent::JobsPurged { .. } => {}
    }
}

fn count_failed(jobs: &[DownloadJob]) -> usize {
    jobs.iter()
        .filter(|job| !job.is_aggregate && job.status == JobStatus::Failed)
        .count()
}

/// One media item per URL. Ids come from the URL's file stem and are made
/// unique within the batch.
fn items_for_urls(urls: &[String]) -> Vec<MediaItem> {
    let mut taken = HashSet::new();
    urls.iter()
        .map(|url| {
            let base = url_stem(url);
            let mut id = base.clone();
            let mut n = 1;
            while !taken.insert(id.clone()) {
                n += 1;
                id = format!("{base}-{n}");
            }
            MediaItem::new(id, DIRECT_SOURCE).with_file_url(url.clone())
        })
        .collect()
}

fn url_stem(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let segment = path.trim_end_matches('/').rsplit('/').next().unwrap_or("");
    let stem = segment.split('.').next().unwrap_or(segment);
    if stem.is_empty() {
        "file".to_string()
    } else {
        stem.to_string()
    }
}
