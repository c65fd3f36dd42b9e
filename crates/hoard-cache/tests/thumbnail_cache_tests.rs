//! Integration tests for the thumbnail disk cache.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use hoard_cache::{ThumbnailCache, ThumbnailCacheConfig};
use hoard_core::{ThumbnailError, ThumbnailFetcherPort};
use hoard_runtime::{WorkQueue, WorkQueueConfig};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

/// Serves `size` bytes per URL after a delay, counting calls.
struct FakeFetcher {
    size: usize,
    delay: Duration,
    calls: AtomicUsize,
    fail: AtomicBool,
}

impl FakeFetcher {
    fn new(size: usize, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            size,
            delay,
            calls: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ThumbnailFetcherPort for FakeFetcher {
    async fn fetch(&self, url: &str) -> Result<Bytes, ThumbnailError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        if self.fail.load(Ordering::SeqCst) {
            return Err(ThumbnailError::fetch(url, "503 Service Unavailable"));
        }
        Ok(Bytes::from(vec![0xAB; self.size]))
    }
}

async fn open(dir: &TempDir, budget: u64, fetcher: &Arc<FakeFetcher>) -> ThumbnailCache {
    let fetcher: Arc<dyn ThumbnailFetcherPort> = fetcher.clone();
    ThumbnailCache::open(ThumbnailCacheConfig::new(dir.path(), budget), fetcher)
        .await
        .unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_requests_for_one_url_fetch_once() {
    let tmp = TempDir::new().unwrap();
    let fetcher = FakeFetcher::new(128, Duration::from_millis(50));
    let cache = Arc::new(open(&tmp, 1024 * 1024, &fetcher).await);

    let url = "https://cdn.example/preview/abc.jpg";
    let handles: Vec<_> = (0..50)
        .map(|_| {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move { cache.get_or_add(url).await })
        })
        .collect();

    let mut paths = Vec::new();
    for handle in handles {
        paths.push(handle.await.unwrap().unwrap());
    }

    assert_eq!(fetcher.calls(), 1);
    assert!(paths.iter().all(|p| p == &paths[0]));
    assert!(paths[0].exists());
    assert_eq!(paths[0].extension().unwrap(), "jpg");
    assert_eq!(cache.get_used_bytes(), 128);
}

#[tokio::test]
async fn try_get_cached_path_never_fetches() {
    let tmp = TempDir::new().unwrap();
    let fetcher = FakeFetcher::new(10, Duration::ZERO);
    let cache = open(&tmp, 1024, &fetcher).await;

    assert!(cache.try_get_cached_path("https://x/a.png").is_none());
    assert_eq!(fetcher.calls(), 0);

    let path = cache.get_or_add("https://x/a.png").await.unwrap();
    assert_eq!(cache.try_get_cached_path("https://x/a.png"), Some(path));
    assert_eq!(fetcher.calls(), 1);
}

#[tokio::test]
async fn least_recently_used_entry_is_evicted_first() {
    let tmp = TempDir::new().unwrap();
    let fetcher = FakeFetcher::new(100, Duration::ZERO);
    let cache = open(&tmp, 300, &fetcher).await;

    let a = cache.get_or_add("https://x/a.png").await.unwrap();
    let b = cache.get_or_add("https://x/b.png").await.unwrap();
    let c = cache.get_or_add("https://x/c.png").await.unwrap();

    // Touch `a` so `b` becomes the oldest.
    assert!(cache.try_get_cached_path("https://x/a.png").is_some());
    let d = cache.get_or_add("https://x/d.png").await.unwrap();

    assert!(a.exists());
    assert!(!b.exists());
    assert!(c.exists());
    assert!(d.exists());
    assert!(cache.try_get_cached_path("https://x/b.png").is_none());
    assert_eq!(cache.get_used_bytes(), 300);
}

#[tokio::test]
async fn leased_entry_is_not_evicted() {
    let tmp = TempDir::new().unwrap();
    let fetcher = FakeFetcher::new(100, Duration::ZERO);
    let cache = open(&tmp, 200, &fetcher).await;

    cache.get_or_add("https://x/a.png").await.unwrap();
    cache.get_or_add("https://x/b.png").await.unwrap();

    let lease = cache.open("https://x/a.png").unwrap();
    cache.try_get_cached_path("https://x/b.png");
    cache.get_or_add("https://x/c.png").await.unwrap();

    assert!(lease.path().exists());
    assert!(cache.try_get_cached_path("https://x/b.png").is_none());
    drop(lease);

    assert_eq!(cache.clear().await, 2);
    assert!(cache.is_empty());
    assert_eq!(cache.get_used_bytes(), 0);
}

#[tokio::test]
async fn index_is_rebuilt_on_reopen() {
    let tmp = TempDir::new().unwrap();
    let fetcher = FakeFetcher::new(64, Duration::ZERO);
    let path = {
        let cache = open(&tmp, 4096, &fetcher).await;
        cache.get_or_add("https://x/keep.webp").await.unwrap()
    };
    std::fs::write(tmp.path().join("deadbeef.png.tmp"), b"partial").unwrap();

    let cache = open(&tmp, 4096, &fetcher).await;
    assert_eq!(cache.try_get_cached_path("https://x/keep.webp"), Some(path));
    assert_eq!(cache.get_used_bytes(), 64);
    assert!(!tmp.path().join("deadbeef.png.tmp").exists());
    assert_eq!(fetcher.calls(), 1);
}

#[tokio::test]
async fn failed_fetch_is_not_cached() {
    let tmp = TempDir::new().unwrap();
    let fetcher = FakeFetcher::new(8, Duration::ZERO);
    let cache = open(&tmp, 4096, &fetcher).await;

    fetcher.fail.store(true, Ordering::SeqCst);
    let err = cache.get_or_add("https://x/e.png").await.unwrap_err();
    assert!(matches!(err, ThumbnailError::Fetch { .. }));

    fetcher.fail.store(false, Ordering::SeqCst);
    assert!(cache.get_or_add("https://x/e.png").await.is_ok());
    assert_eq!(fetcher.calls(), 2);
}

#[tokio::test]
async fn cancelled_lookup_returns_cancelled() {
    let tmp = TempDir::new().unwrap();
    let fetcher = FakeFetcher::new(8, Duration::from_secs(30));
    let cache = open(&tmp, 4096, &fetcher).await;

    let token = CancellationToken::new();
    token.cancel();
    let err = cache
        .get_or_add_cancellable("https://x/slow.png", &token)
        .await
        .unwrap_err();
    assert_eq!(err, ThumbnailError::Cancelled);
}

#[tokio::test]
async fn warm_fills_cache_in_background() {
    let tmp = TempDir::new().unwrap();
    let fetcher = FakeFetcher::new(16, Duration::ZERO);
    let cache = Arc::new(open(&tmp, 4096, &fetcher).await);
    let queue = WorkQueue::start(WorkQueueConfig::default().with_workers(2));

    let urls = vec!["https://x/1.png".to_string(), "https://x/2.png".to_string()];
    assert_eq!(cache.warm(urls, &queue), 2);
    queue.shutdown(Duration::from_secs(5)).await;

    assert_eq!(cache.len(), 2);
    assert_eq!(fetcher.calls(), 2);
}

#[tokio::test]
async fn evicted_key_can_be_fetched_again() {
    let tmp = TempDir::new().unwrap();
    let fetcher = FakeFetcher::new(100, Duration::ZERO);
    let cache = open(&tmp, 100, &fetcher).await;

    let a = cache.get_or_add("https://x/a.png").await.unwrap();
    let b = cache.get_or_add("https://x/b.png").await.unwrap();
    assert!(!a.exists());
    assert!(cache.try_get_cached_path("https://x/a.png").is_none());

    // Refetching `a` evicts `b` and must leave the new file of `a` in place.
    let again = cache.get_or_add("https://x/a.png").await.unwrap();
    assert_eq!(again, a);
    assert!(again.exists());
    assert!(!b.exists());
    assert_eq!(cache.get_used_bytes(), 100);
    assert_eq!(fetcher.calls(), 3);
}

#[tokio::test]
async fn vanished_file_is_fetched_again() {
    let tmp = TempDir::new().unwrap();
    let fetcher = FakeFetcher::new(10, Duration::ZERO);
    let cache = open(&tmp, 1024, &fetcher).await;

    let path = cache.get_or_add("https://x/gone.png").await.unwrap();
    std::fs::remove_file(&path).unwrap();

    // Index-only lookups do not notice until the next fetch path runs.
    assert_eq!(cache.try_get_cached_path("https://x/gone.png"), Some(path.clone()));
    let again = cache.get_or_add("https://x/gone.png").await.unwrap();
    assert_eq!(again, path);
    assert!(again.exists());
    assert_eq!(fetcher.calls(), 2);
    assert_eq!(cache.get_used_bytes(), 10);
}
