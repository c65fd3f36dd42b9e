//! Shared fakes for download manager tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use mockall::mock;
use tempfile::TempDir;
use tokio::sync::{Semaphore, broadcast};

use hoard_core::{
    BroadcastDownloadEmitter, ByteSourcePort, DownloadError, DownloadEvent, DownloadJob,
    DownloadManagerConfig, DownloadManagerPort, JobId, MediaItem, OpenedStream,
    PlatformClientPort, PlatformError, SearchPage, SearchParams,
};
use hoard_download::{DownloadManagerDeps, DownloadManagerImpl, build_download_manager};

pub const CHUNK: usize = 4;

mock! {
    pub Platform {}

    #[async_trait]
    impl PlatformClientPort for Platform {
        async fn search(&self, params: &SearchParams) -> Result<SearchPage, PlatformError>;
        async fn get_media_details(&self, id: &str) -> Result<Option<MediaItem>, PlatformError>;
        async fn get_download_url(&self, id: &str) -> Result<Option<String>, PlatformError>;
    }
}

/// In-memory byte source serving fixed bodies in `CHUNK`-sized pieces.
///
/// With a gate, every chunk consumes one permit, so a test decides exactly
/// how far each transfer gets.
pub struct FakeSource {
    bodies: Mutex<HashMap<String, Vec<u8>>>,
    gate: Option<Arc<Semaphore>>,
    opens: Mutex<Vec<(String, u64)>>,
}

impl FakeSource {
    pub fn new() -> Self {
        Self {
            bodies: Mutex::new(HashMap::new()),
            gate: None,
            opens: Mutex::new(Vec::new()),
        }
    }

    pub fn gated() -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        let source = Self {
            gate: Some(Arc::clone(&gate)),
            ..Self::new()
        };
        (source, gate)
    }

    pub fn serve(&self, url: &str, body: &[u8]) {
        self.bodies
            .lock()
            .unwrap()
            .insert(url.to_string(), body.to_vec());
    }

    /// Every `(url, offset)` the manager opened, in order.
    pub fn opens(&self) -> Vec<(String, u64)> {
        self.opens.lock().unwrap().clone()
    }
}

#[async_trait]
impl ByteSourcePort for FakeSource {
    async fn open(&self, url: &str, offset: u64) -> Result<OpenedStream, DownloadError> {
        self.opens.lock().unwrap().push((url.to_string(), offset));
        let body = self
            .bodies
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| DownloadError::not_found(url))?;

        let start = usize::try_from(offset).unwrap().min(body.len());
        let chunks: Vec<Bytes> = body[start..]
            .chunks(CHUNK)
            .map(Bytes::copy_from_slice)
            .collect();
        let gate = self.gate.clone();

        let stream = futures_util::stream::unfold(
            (chunks.into_iter(), gate),
            |(mut chunks, gate)| async move {
                let chunk = chunks.next()?;
                if let Some(gate) = &gate {
                    gate.acquire().await.ok()?.forget();
                }
                Some((Ok(chunk), (chunks, gate)))
            },
        );

        Ok(OpenedStream {
            stream: Box::pin(stream),
            total_len: Some(body.len() as u64),
            resumed_from: start as u64,
        })
    }
}

pub struct Harness {
    pub manager: Arc<DownloadManagerImpl>,
    pub source: Arc<FakeSource>,
    pub events: broadcast::Receiver<DownloadEvent>,
    pub dir: TempDir,
}

impl Harness {
    pub fn new(source: FakeSource, platform: MockPlatform, max_concurrent: usize) -> Self {
        Self::with_progress_interval(source, platform, max_concurrent, Duration::from_millis(1))
    }

    pub fn with_progress_interval(
        source: FakeSource,
        platform: MockPlatform,
        max_concurrent: usize,
        progress_interval: Duration,
    ) -> Self {
        let emitter = Arc::new(BroadcastDownloadEmitter::with_capacity(4096));
        let events = emitter.subscribe();
        let source = Arc::new(source);
        let config = DownloadManagerConfig::default()
            .with_max_concurrent(max_concurrent)
            .with_progress_interval(progress_interval);

        let manager = build_download_manager(DownloadManagerDeps {
            platform: Arc::new(platform),
            byte_source: Arc::clone(&source),
            event_emitter: emitter,
            config,
        });

        Self {
            manager,
            source,
            events,
            dir: TempDir::new().unwrap(),
        }
    }

    pub fn dest(&self) -> PathBuf {
        self.dir.path().to_path_buf()
    }

    /// Every event received so far.
    pub fn drain_events(&mut self) -> Vec<DownloadEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }
}

/// An item served by `source` under `https://media.test/<id>.bin`.
pub fn served_item(source: &FakeSource, id: &str, body: &[u8]) -> MediaItem {
    let url = format!("https://media.test/{id}.bin");
    source.serve(&url, body);
    MediaItem::new(id, "test").with_file_url(url)
}

pub fn part_path(output: &Path) -> PathBuf {
    let mut part = output.as_os_str().to_owned();
    part.push(".part");
    PathBuf::from(part)
}

/// Poll until `pred` holds for the job, failing after five seconds.
pub async fn wait_for_job<F>(manager: &DownloadManagerImpl, id: JobId, pred: F) -> DownloadJob
where
    F: Fn(&DownloadJob) -> bool,
{
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        if let Some(job) = manager.get_job(id).await {
            if pred(&job) {
                return job;
            }
        }
        assert!(Instant::now() < deadline, "timed out waiting for job {id}");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Poll until no transfer is active.
pub async fn wait_idle(manager: &DownloadManagerImpl) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while manager.active_count().await > 0 {
        assert!(Instant::now() < deadline, "timed out waiting for idle manager");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
