//! reqwest-backed byte source and thumbnail fetcher.

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::TryStreamExt;
use reqwest::StatusCode;
use reqwest::header::{CONTENT_RANGE, RANGE};

use hoard_core::{
    ByteSourcePort, DownloadError, OpenedStream, ThumbnailError, ThumbnailFetcherPort,
};

use crate::config::HttpClientConfig;
use crate::error::HttpError;

/// HTTP client shared by downloads and thumbnail fetches.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    config: HttpClientConfig,
}

impl HttpClient {
    /// Build a client from `config`.
    pub fn new(config: HttpClientConfig) -> Result<Self, HttpError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .connect_timeout(config.connect_timeout)
            .build()?;
        Ok(Self { client, config })
    }

    /// GET `url`, asking for the body from `offset` onwards when non-zero.
    async fn get(&self, url: &str, offset: u64) -> Result<reqwest::Response, HttpError> {
        let mut request = self.client.get(url);
        if offset > 0 {
            request = request.header(RANGE, format!("bytes={offset}-"));
        }
        request.send().await.map_err(HttpError::from)
    }
}

/// Full length from a `Content-Range: bytes a-b/total` header.
fn content_range_total(response: &reqwest::Response) -> Option<u64> {
    let value = response.headers().get(CONTENT_RANGE)?.to_str().ok()?;
    let (_, total) = value.rsplit_once('/')?;
    total.trim().parse().ok()
}

fn status_error(status: StatusCode, url: &str) -> HttpError {
    HttpError::Status {
        status: status.as_u16(),
        url: url.to_string(),
    }
}

#[async_trait]
impl ByteSourcePort for HttpClient {
    async fn open(&self, url: &str, offset: u64) -> Result<OpenedStream, DownloadError> {
        let mut response = self.get(url, offset).await?;
        let mut status = response.status();

        // The part file already covers the whole resource, or the server
        // no longer agrees on its size. Start over.
        if offset > 0 && status == StatusCode::RANGE_NOT_SATISFIABLE {
            tracing::debug!(target: "hoard.download", url = %url, offset, "Range rejected, restarting");
            response = self.get(url, 0).await?;
            status = response.status();
        }

        if !status.is_success() {
            return Err(status_error(status, url).into());
        }

        let (resumed_from, total_len) = if offset > 0 && status == StatusCode::PARTIAL_CONTENT {
            let total = content_range_total(&response)
                .or_else(|| response.content_length().map(|len| len + offset));
            (offset, total)
        } else {
            (0, response.content_length())
        };

        if offset > 0 && resumed_from == 0 {
            tracing::debug!(target: "hoard.download", url = %url, "Server ignored range request");
        }

        let stream = response
            .bytes_stream()
            .map_err(|e| DownloadError::from(HttpError::Transport(e)));

        Ok(OpenedStream {
            stream: Box::pin(stream),
            total_len,
            resumed_from,
        })
    }
}

#[async_trait]
impl ThumbnailFetcherPort for HttpClient {
    async fn fetch(&self, url: &str) -> Result<Bytes, ThumbnailError> {
        let fetch = async {
            let response = self
                .client
                .get(url)
                .timeout(self.config.thumbnail_timeout)
                .send()
                .await?;
            let status = response.status();
            if !status.is_success() {
                return Err(status_error(status, url));
            }
            Ok(response.bytes().await?)
        };

        fetch.await.map_err(|e| {
            tracing::debug!(target: "hoard.cache", url = %url, error = %e, "Thumbnail fetch failed");
            e.into_thumbnail_error(url)
        })
    }
}
