//! Integration tests for the download manager.
//!
//! Transfers run against an in-memory byte source. Gated sources let a test
//! hold a transfer at an exact byte offset before pausing or cancelling it.

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use hoard_core::{DownloadError, DownloadEvent, DownloadManagerPort, JobStatus, MediaItem};

use common::{
    FakeSource, Harness, MockPlatform, part_path, served_item, wait_for_job, wait_idle,
};

const BODY: &[u8] = b"0123456789abcdef";

#[tokio::test]
async fn single_download_completes() {
    let source = FakeSource::new();
    let item = served_item(&source, "1", BODY);
    let h = Harness::new(source, MockPlatform::new(), 2);

    let id = h.manager.queue_download(item, h.dest()).await.unwrap();
    let job = wait_for_job(&h.manager, id, |j| j.status == JobStatus::Completed).await;

    let output = job.output_path.clone().unwrap();
    assert_eq!(std::fs::read(&output).unwrap(), BODY);
    assert!(!part_path(&output).exists());
    assert_eq!(job.bytes_downloaded, BODY.len() as u64);
    assert_eq!(job.total_bytes, BODY.len() as u64);
    assert_eq!(
        job.item.as_ref().and_then(|i| i.local_file_path.clone()),
        Some(output)
    );
    assert!(job.started_at.is_some());
    assert!(job.completed_at.is_some());
}

#[tokio::test]
async fn group_status_follows_children() {
    let (source, gate) = FakeSource::gated();
    let items: Vec<MediaItem> = (0..3)
        .map(|i| served_item(&source, &i.to_string(), b"abcdefgh"))
        .collect();
    let mut h = Harness::new(source, MockPlatform::new(), 1);

    let children = h
        .manager
        .queue_multiple_downloads(items, h.dest(), Some("pool".into()))
        .await
        .unwrap();
    assert_eq!(children.len(), 3);

    let parent_id = h.manager.get_job(children[0]).await.unwrap().parent_id.unwrap();
    let added: Vec<_> = h
        .drain_events()
        .into_iter()
        .filter_map(|e| match e {
            DownloadEvent::JobAdded { job } => Some(job),
            _ => None,
        })
        .collect();
    assert_eq!(added.len(), 4);
    assert_eq!(added[0].id, parent_id);
    assert!(added[0].is_aggregate);
    assert!(added.iter().all(|j| j.status == JobStatus::Queued));

    // Two chunks per child: let the first two finish, hold the third.
    gate.add_permits(4);
    wait_for_job(&h.manager, children[1], |j| j.status == JobStatus::Completed).await;
    wait_for_job(&h.manager, children[2], |j| j.status == JobStatus::Downloading).await;
    let parent = h.manager.get_job(parent_id).await.unwrap();
    assert_eq!(parent.status, JobStatus::Downloading);
    assert_eq!(
        h.manager.get_job(children[0]).await.unwrap().status,
        JobStatus::Completed
    );

    gate.add_permits(2);
    wait_for_job(&h.manager, children[2], |j| j.status == JobStatus::Completed).await;
    let parent = wait_for_job(&h.manager, parent_id, |j| j.status == JobStatus::Completed).await;
    assert_eq!(parent.bytes_downloaded, 24);
    assert_eq!(parent.total_bytes, 24);
    assert_eq!(parent.children_ids, children);
}

#[tokio::test]
async fn failed_child_does_not_abort_siblings() {
    let source = FakeSource::new();
    let ok = served_item(&source, "ok", BODY);
    let missing = MediaItem::new("missing", "test");

    let mut platform = MockPlatform::new();
    platform
        .expect_get_download_url()
        .returning(|_| Ok(None));
    let h = Harness::new(source, platform, 2);

    let children = h
        .manager
        .queue_multiple_downloads(vec![missing, ok], h.dest(), None)
        .await
        .unwrap();

    let failed = wait_for_job(&h.manager, children[0], |j| j.status == JobStatus::Failed).await;
    assert!(failed.error_message.unwrap().contains("missing"));
    wait_for_job(&h.manager, children[1], |j| j.status == JobStatus::Completed).await;

    let parent = h.manager.get_job(failed.parent_id.unwrap()).await.unwrap();
    assert_eq!(parent.status, JobStatus::Failed);
}

#[tokio::test]
async fn pause_then_resume_continues_from_part_file() {
    let (source, gate) = FakeSource::gated();
    let item = served_item(&source, "p", BODY);
    let mut h = Harness::new(source, MockPlatform::new(), 1);

    let id = h.manager.queue_download(item, h.dest()).await.unwrap();
    gate.add_permits(2);
    wait_for_job(&h.manager, id, |j| j.bytes_downloaded == 8).await;

    assert!(h.manager.pause(id).await);
    wait_idle(&h.manager).await;
    let paused = h.manager.get_job(id).await.unwrap();
    assert_eq!(paused.status, JobStatus::Paused);
    assert_eq!(paused.bytes_downloaded, 8);
    let output = paused.output_path.clone().unwrap();
    assert_eq!(std::fs::metadata(part_path(&output)).unwrap().len(), 8);
    assert!(!h.manager.pause(id).await);

    h.drain_events();
    assert!(h.manager.resume(id).await);
    let resumed = h.drain_events().into_iter().find_map(|e| match e {
        DownloadEvent::StatusChanged { job, previous } if job.id == id => Some((job, previous)),
        _ => None,
    });
    let (job, previous) = resumed.unwrap();
    assert_eq!(previous, JobStatus::Paused);
    assert_eq!(job.status, JobStatus::Queued);

    gate.add_permits(10);
    wait_for_job(&h.manager, id, |j| j.status == JobStatus::Completed).await;
    assert_eq!(std::fs::read(&output).unwrap(), BODY);

    let opens = h.source.opens();
    assert_eq!(opens.len(), 2);
    assert_eq!(opens[0].1, 0);
    assert_eq!(opens[1].1, 8);
}

#[tokio::test]
async fn cancel_deletes_part_file() {
    let (source, gate) = FakeSource::gated();
    let item = served_item(&source, "c", BODY);
    let h = Harness::new(source, MockPlatform::new(), 1);

    let id = h.manager.queue_download(item, h.dest()).await.unwrap();
    gate.add_permits(2);
    let job = wait_for_job(&h.manager, id, |j| j.bytes_downloaded == 8).await;
    let output = job.output_path.unwrap();
    assert!(part_path(&output).exists());

    assert!(h.manager.cancel(id).await);
    wait_idle(&h.manager).await;

    let job = h.manager.get_job(id).await.unwrap();
    assert_eq!(job.status, JobStatus::Cancelled);
    assert_eq!(job.bytes_downloaded, 0);
    assert!(!part_path(&output).exists());
    assert!(!output.exists());
    assert!(!h.manager.cancel(id).await);
}

#[tokio::test]
async fn cancel_paused_job_deletes_part_file() {
    let (source, gate) = FakeSource::gated();
    let item = served_item(&source, "cp", BODY);
    let h = Harness::new(source, MockPlatform::new(), 1);

    let id = h.manager.queue_download(item, h.dest()).await.unwrap();
    gate.add_permits(1);
    let job = wait_for_job(&h.manager, id, |j| j.bytes_downloaded == 4).await;
    let output = job.output_path.unwrap();

    assert!(h.manager.pause(id).await);
    wait_idle(&h.manager).await;
    assert!(part_path(&output).exists());

    assert!(h.manager.cancel(id).await);
    assert!(!part_path(&output).exists());
}

#[tokio::test]
async fn retry_counts_once_and_clears_error() {
    let source = FakeSource::new();
    source.serve("https://media.test/late.bin", BODY);

    let calls = Arc::new(AtomicUsize::new(0));
    let mut platform = MockPlatform::new();
    let counter = Arc::clone(&calls);
    platform.expect_get_download_url().returning(move |_| {
        if counter.fetch_add(1, Ordering::SeqCst) == 0 {
            Ok(None)
        } else {
            Ok(Some("https://media.test/late.bin".to_string()))
        }
    });
    let h = Harness::new(source, platform, 1);

    let id = h
        .manager
        .queue_download(MediaItem::new("late", "test"), h.dest())
        .await
        .unwrap();
    let failed = wait_for_job(&h.manager, id, |j| j.status == JobStatus::Failed).await;
    assert_eq!(failed.retry_count, 0);
    assert!(failed.error_message.is_some());

    assert!(h.manager.retry(id).await);
    assert!(!h.manager.retry(id).await);

    let done = wait_for_job(&h.manager, id, |j| j.status == JobStatus::Completed).await;
    assert_eq!(done.retry_count, 1);
    assert!(done.error_message.is_none());
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn sequences_strictly_increase_across_calls() {
    let (source, _gate) = FakeSource::gated();
    let a = served_item(&source, "a", BODY);
    let group: Vec<MediaItem> = ["b", "c"]
        .iter()
        .map(|id| served_item(&source, id, BODY))
        .collect();
    let d = served_item(&source, "d", BODY);
    let h = Harness::new(source, MockPlatform::new(), 1);

    h.manager.queue_download(a, h.dest()).await.unwrap();
    h.manager
        .queue_multiple_downloads(group, h.dest(), None)
        .await
        .unwrap();
    h.manager.queue_download(d, h.dest()).await.unwrap();

    let jobs = h.manager.get_jobs().await;
    assert_eq!(jobs.len(), 5);
    assert!(jobs.windows(2).all(|w| w[0].sequence < w[1].sequence));
}

#[tokio::test]
async fn concurrency_is_bounded() {
    let (source, gate) = FakeSource::gated();
    let items: Vec<MediaItem> = (0..5)
        .map(|i| served_item(&source, &format!("n{i}"), BODY))
        .collect();
    let h = Harness::new(source, MockPlatform::new(), 2);

    for item in items {
        h.manager.queue_download(item, h.dest()).await.unwrap();
    }

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(h.manager.active_count().await, 2);
    assert_eq!(h.manager.pending_count().await, 3);

    gate.add_permits(100);
    for job in h.manager.get_jobs().await {
        wait_for_job(&h.manager, job.id, |j| j.status == JobStatus::Completed).await;
    }
    assert_eq!(h.manager.pending_count().await, 0);
}

#[tokio::test]
async fn unknown_ids_are_rejected_quietly() {
    let h = Harness::new(FakeSource::new(), MockPlatform::new(), 1);
    let id = hoard_core::JobId::generate();

    assert!(h.manager.get_job(id).await.is_none());
    assert!(!h.manager.pause(id).await);
    assert!(!h.manager.resume(id).await);
    assert!(!h.manager.cancel(id).await);
    assert!(!h.manager.retry(id).await);
    assert!(!h.manager.purge(id).await);
}

#[tokio::test]
async fn empty_group_queues_nothing() {
    let h = Harness::new(FakeSource::new(), MockPlatform::new(), 1);
    let ids = h
        .manager
        .queue_multiple_downloads(Vec::new(), h.dest(), Some("pool".into()))
        .await
        .unwrap();
    assert!(ids.is_empty());
    assert!(h.manager.get_jobs().await.is_empty());
}

#[tokio::test]
async fn purge_removes_only_terminal_jobs() {
    let (source, gate) = FakeSource::gated();
    let done = served_item(&source, "done", b"ab");
    let held = served_item(&source, "held", BODY);
    let mut h = Harness::new(source, MockPlatform::new(), 1);

    let done_id = h.manager.queue_download(done, h.dest()).await.unwrap();
    gate.add_permits(1);
    wait_for_job(&h.manager, done_id, |j| j.status == JobStatus::Completed).await;
    let held_id = h.manager.queue_download(held, h.dest()).await.unwrap();

    assert!(!h.manager.purge(held_id).await);
    h.drain_events();
    assert!(h.manager.purge(done_id).await);
    let purged = h.drain_events().into_iter().find_map(|e| match e {
        DownloadEvent::JobsPurged { ids } => Some(ids),
        _ => None,
    });
    assert_eq!(purged, Some(vec![done_id]));
    assert!(h.manager.get_job(done_id).await.is_none());

    assert_eq!(h.manager.cancel_all().await, 1);
    assert_eq!(h.manager.purge_finished().await, 1);
    assert!(h.manager.get_jobs().await.is_empty());
}

#[tokio::test]
async fn shutdown_interrupts_and_rejects_new_work() {
    let (source, gate) = FakeSource::gated();
    let item = served_item(&source, "s", BODY);
    let extra = served_item(&source, "extra", BODY);
    let h = Harness::new(source, MockPlatform::new(), 1);

    let id = h.manager.queue_download(item, h.dest()).await.unwrap();
    gate.add_permits(1);
    wait_for_job(&h.manager, id, |j| j.bytes_downloaded == 4).await;

    h.manager.shutdown().await;

    let job = h.manager.get_job(id).await.unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.bytes_downloaded, 4);
    assert!(part_path(&job.output_path.unwrap()).exists());

    let err = h.manager.queue_download(extra, h.dest()).await.unwrap_err();
    assert_eq!(err, DownloadError::ShuttingDown);
}

#[tokio::test]
async fn colliding_output_paths_are_rejected() {
    let (source, gate) = FakeSource::gated();
    // Both ids sanitize to the same file name.
    let first = served_item(&source, "a/b", b"AAAAAAAAAAAAAAAA");
    let second = served_item(&source, "a_b", b"BBBBBBBBBBBBBBBB");
    let h = Harness::new(source, MockPlatform::new(), 2);

    let id = h.manager.queue_download(first.clone(), h.dest()).await.unwrap();

    let err = h.manager.queue_download(second.clone(), h.dest()).await.unwrap_err();
    assert!(matches!(err, DownloadError::AlreadyQueued { .. }));
    let err = h.manager.queue_download(first, h.dest()).await.unwrap_err();
    assert!(matches!(err, DownloadError::AlreadyQueued { .. }));
    let err = h
        .manager
        .queue_multiple_downloads(vec![second.clone()], h.dest(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, DownloadError::AlreadyQueued { .. }));
    assert_eq!(h.manager.get_jobs().await.len(), 1);

    gate.add_permits(4);
    let done = wait_for_job(&h.manager, id, |j| j.status == JobStatus::Completed).await;
    let output = done.output_path.unwrap();
    assert_eq!(std::fs::read(&output).unwrap(), b"AAAAAAAAAAAAAAAA");

    // A completed job releases its output path.
    h.manager.queue_download(second, h.dest()).await.unwrap();
}

#[tokio::test]
async fn group_with_colliding_items_is_rejected() {
    let source = FakeSource::new();
    let items = vec![
        served_item(&source, "x/y", BODY),
        served_item(&source, "x_y", BODY),
    ];
    let h = Harness::new(source, MockPlatform::new(), 1);

    let err = h
        .manager
        .queue_multiple_downloads(items, h.dest(), Some("pool".into()))
        .await
        .unwrap_err();
    assert!(matches!(err, DownloadError::AlreadyQueued { .. }));
    assert!(h.manager.get_jobs().await.is_empty());
}

#[tokio::test]
async fn job_events_follow_state_order() {
    let source = FakeSource::new();
    let item = served_item(&source, "ordered", BODY);
    let mut h = Harness::new(source, MockPlatform::new(), 1);

    let id = h.manager.queue_download(item, h.dest()).await.unwrap();
    wait_for_job(&h.manager, id, |j| j.status == JobStatus::Completed).await;

    let events: Vec<DownloadEvent> = h
        .drain_events()
        .into_iter()
        .filter(|e| e.job_id() == Some(id))
        .collect();
    assert!(events.len() >= 4, "too few events: {events:?}");

    assert!(matches!(&events[0], DownloadEvent::JobAdded { job } if job.status == JobStatus::Queued));
    assert!(matches!(
        &events[1],
        DownloadEvent::StatusChanged { job, previous }
            if *previous == JobStatus::Queued && job.status == JobStatus::Downloading
    ));
    assert!(matches!(
        events.last().unwrap(),
        DownloadEvent::StatusChanged { job, previous }
            if *previous == JobStatus::Downloading && job.status == JobStatus::Completed
    ));

    let progress: Vec<u64> = events[2..events.len() - 1]
        .iter()
        .map(|e| match e {
            DownloadEvent::ProgressUpdated { job } => job.bytes_downloaded,
            other => panic!("unexpected event between start and completion: {other:?}"),
        })
        .collect();
    assert!(!progress.is_empty());
    assert!(progress.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(*progress.last().unwrap(), BODY.len() as u64);
}

#[tokio::test]
async fn aggregate_emits_its_own_transitions() {
    let (source, gate) = FakeSource::gated();
    let items: Vec<MediaItem> = ["g1", "g2"]
        .iter()
        .map(|id| served_item(&source, id, BODY))
        .collect();
    let mut h = Harness::new(source, MockPlatform::new(), 2);

    let children = h
        .manager
        .queue_multiple_downloads(items, h.dest(), None)
        .await
        .unwrap();
    let parent_id = h.manager.get_job(children[0]).await.unwrap().parent_id.unwrap();

    // Both children hold a slot before any byte moves.
    for child in &children {
        wait_for_job(&h.manager, *child, |j| j.status == JobStatus::Downloading).await;
    }
    gate.add_permits(100);
    wait_for_job(&h.manager, parent_id, |j| j.status == JobStatus::Completed).await;

    let transitions: Vec<(JobStatus, JobStatus)> = h
        .drain_events()
        .into_iter()
        .filter_map(|e| match e {
            DownloadEvent::StatusChanged { job, previous } if job.id == parent_id => {
                Some((previous, job.status))
            }
            _ => None,
        })
        .collect();
    assert_eq!(
        transitions,
        vec![
            (JobStatus::Queued, JobStatus::Downloading),
            (JobStatus::Downloading, JobStatus::Completed),
        ]
    );
}

#[tokio::test]
async fn cancelling_group_stops_active_child() {
    let (source, gate) = FakeSource::gated();
    let items: Vec<MediaItem> = ["k1", "k2"]
        .iter()
        .map(|id| served_item(&source, id, BODY))
        .collect();
    let mut h = Harness::new(source, MockPlatform::new(), 1);

    let children = h
        .manager
        .queue_multiple_downloads(items, h.dest(), Some("pool".into()))
        .await
        .unwrap();
    let parent_id = h.manager.get_job(children[0]).await.unwrap().parent_id.unwrap();

    gate.add_permits(2);
    let running = wait_for_job(&h.manager, children[0], |j| j.bytes_downloaded == 8).await;
    let output = running.output_path.unwrap();
    assert!(part_path(&output).exists());

    h.drain_events();
    assert!(h.manager.cancel(parent_id).await);
    // The gate is closed, so only a fired token lets the transfer end.
    wait_idle(&h.manager).await;

    for child in &children {
        let job = h.manager.get_job(*child).await.unwrap();
        assert_eq!(job.status, JobStatus::Cancelled);
        assert_eq!(job.bytes_downloaded, 0);
    }
    assert!(!part_path(&output).exists());
    assert!(!output.exists());
    assert_eq!(h.source.opens().len(), 1);

    let parent = h.manager.get_job(parent_id).await.unwrap();
    assert_eq!(parent.status, JobStatus::Cancelled);
    assert_eq!(parent.bytes_downloaded, 0);

    let last_parent_status = h.drain_events().into_iter().rev().find_map(|e| match e {
        DownloadEvent::StatusChanged { job, .. } if job.id == parent_id => Some(job.status),
        _ => None,
    });
    assert_eq!(last_parent_status, Some(JobStatus::Cancelled));
}

#[tokio::test]
async fn held_back_progress_lands_when_window_reopens() {
    let (source, gate) = FakeSource::gated();
    let item = served_item(&source, "slow", BODY);
    let mut h = Harness::with_progress_interval(
        source,
        MockPlatform::new(),
        1,
        Duration::from_millis(100),
    );

    let id = h.manager.queue_download(item, h.dest()).await.unwrap();
    // Two chunks arrive inside one window, then the transfer stalls.
    gate.add_permits(2);
    wait_for_job(&h.manager, id, |j| j.bytes_downloaded == 8).await;

    let updates: Vec<u64> = h
        .drain_events()
        .into_iter()
        .filter_map(|e| match e {
            DownloadEvent::ProgressUpdated { job } if job.id == id => Some(job.bytes_downloaded),
            _ => None,
        })
        .collect();
    assert!(updates.len() <= 3, "progress was not throttled: {updates:?}");
    assert_eq!(updates.last(), Some(&8));

    assert!(h.manager.cancel(id).await);
}
