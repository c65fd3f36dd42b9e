//! Internal error type for HTTP operations.
//!
//! Mapped to the core `DownloadError` / `ThumbnailError` at the port boundary.

use hoard_core::{DownloadError, ThumbnailError};
use thiserror::Error;

/// Errors from the HTTP adapter.
#[derive(Debug, Error)]
pub enum HttpError {
    /// The server answered with a non-success status.
    #[error("HTTP request failed with status {status}: {url}")]
    Status {
        /// HTTP status code
        status: u16,
        /// The URL that was requested
        url: String,
    },

    /// Network or HTTP client error.
    #[error("HTTP error: {0}")]
    Transport(#[from] reqwest::Error),
}

impl HttpError {
    /// Convert into a thumbnail error for `url`.
    pub(crate) fn into_thumbnail_error(self, url: &str) -> ThumbnailError {
        ThumbnailError::fetch(url, self.to_string())
    }
}

impl From<HttpError> for DownloadError {
    fn from(err: HttpError) -> Self {
        let message = err.to_string();
        match err {
            HttpError::Status { status: 404, url } => Self::not_found(url),
            HttpError::Status { status, .. } => Self::network_with_status(message, status),
            HttpError::Transport(e) => match e.status() {
                Some(status) => Self::network_with_status(message, status.as_u16()),
                None => Self::network(message),
            },
        }
    }
}
