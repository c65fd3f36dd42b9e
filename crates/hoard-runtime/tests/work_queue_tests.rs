//! Integration tests for the background work queue.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use hoard_core::Settings;
use hoard_runtime::{WorkQueue, WorkQueueConfig};
use tokio::sync::Barrier;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn workers_run_in_parallel() {
    let queue = WorkQueue::start(WorkQueueConfig::default().with_workers(4));
    let barrier = Arc::new(Barrier::new(4));
    let done = Arc::new(AtomicUsize::new(0));

    // Deadlocks unless all four units run at the same time.
    for _ in 0..4 {
        let barrier = Arc::clone(&barrier);
        let done = Arc::clone(&done);
        queue.enqueue(move |_| async move {
            barrier.wait().await;
            done.fetch_add(1, Ordering::SeqCst);
        });
    }

    queue.shutdown(Duration::from_secs(5)).await;
    assert_eq!(done.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn shutdown_drains_outstanding_work_within_grace() {
    let queue = WorkQueue::start(WorkQueueConfig::default().with_workers(2));
    let done = Arc::new(AtomicUsize::new(0));

    for _ in 0..20 {
        let done = Arc::clone(&done);
        queue.enqueue(move |_| async move {
            tokio::time::sleep(Duration::from_millis(1)).await;
            done.fetch_add(1, Ordering::SeqCst);
        });
    }

    queue.shutdown(Duration::from_secs(5)).await;
    assert_eq!(done.load(Ordering::SeqCst), 20);
}

#[tokio::test]
async fn config_from_settings_uses_background_workers() {
    let settings = Settings {
        background_workers: Some(3),
        ..Settings::default()
    };
    let config = WorkQueueConfig::from_settings(&settings);
    assert_eq!(config.workers, 3);

    let queue = WorkQueue::start(config.with_name("warmers"));
    assert_eq!(queue.pending(), 0);
    queue.shutdown(Duration::from_millis(10)).await;
}

#[tokio::test]
async fn shutdown_waits_for_running_work() {
    let queue = WorkQueue::start(WorkQueueConfig::default().with_workers(1));
    let gate = Arc::new(tokio::sync::Semaphore::new(0));
    let done = Arc::new(AtomicUsize::new(0));

    {
        let gate = Arc::clone(&gate);
        let done = Arc::clone(&done);
        queue.enqueue(move |_| async move {
            let _permit = gate.acquire().await;
            done.fetch_add(1, Ordering::SeqCst);
        });
    }

    let mut shutdown = tokio_test::task::spawn(queue.shutdown(Duration::from_secs(5)));
    tokio_test::assert_pending!(shutdown.poll());
    assert!(queue.is_shut_down());
    assert!(!queue.enqueue(|_| async {}));

    gate.add_permits(1);
    shutdown.await;
    assert_eq!(done.load(Ordering::SeqCst), 1);
}
