//! Byte source port used by the download worker.

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::Stream;

use crate::download::DownloadError;

/// A stream of body chunks.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, DownloadError>> + Send>>;

/// An opened remote resource.
pub struct OpenedStream {
    /// Body chunks starting at `resumed_from`.
    pub stream: ByteStream,
    /// Full length of the resource, when the source reports it.
    pub total_len: Option<u64>,
    /// Offset the body actually starts at. Equals the requested offset when
    /// the source honoured it, 0 when it restarted from the beginning.
    pub resumed_from: u64,
}

impl std::fmt::Debug for OpenedStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenedStream")
            .field("total_len", &self.total_len)
            .field("resumed_from", &self.resumed_from)
            .finish_non_exhaustive()
    }
}

/// Opens remote resources for streaming.
#[async_trait]
pub trait ByteSourcePort: Send + Sync {
    /// Open `url`, asking for the body from byte `offset` onwards.
    ///
    /// Sources that cannot seek return the whole body with
    /// `resumed_from == 0`.
    async fn open(&self, url: &str, offset: u64) -> Result<OpenedStream, DownloadError>;
}
