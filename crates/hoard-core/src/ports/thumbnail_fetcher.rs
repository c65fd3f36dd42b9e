//! Thumbnail fetch port.

use async_trait::async_trait;
use bytes::Bytes;

use crate::cache::ThumbnailError;

/// Fetches a remote thumbnail into memory.
///
/// Thumbnails are small, so the whole body is buffered.
#[async_trait]
pub trait ThumbnailFetcherPort: Send + Sync {
    /// Fetch the resource at `url`.
    async fn fetch(&self, url: &str) -> Result<Bytes, ThumbnailError>;
}
