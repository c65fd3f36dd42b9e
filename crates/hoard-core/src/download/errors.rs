//! Download error types.
//!
//! Serializable so they can cross process or UI boundaries; `std::io::Error`
//! is captured as kind and message strings.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for download operations.
#[derive(Clone, Debug, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum DownloadError {
    /// I/O error during file operations.
    #[error("I/O error ({kind}): {message}")]
    Io {
        /// The kind of I/O error (e.g., "`NotFound`", "`PermissionDenied`").
        kind: String,
        /// Detailed error message.
        message: String,
    },

    /// Network/HTTP error during transfer.
    #[error("Network error: {message}")]
    Network {
        /// Detailed error message.
        message: String,
        /// HTTP status code if available.
        #[serde(skip_serializing_if = "Option::is_none")]
        status_code: Option<u16>,
    },

    /// The remote resource does not exist.
    #[error("Not found: {message}")]
    NotFound {
        /// What was not found.
        message: String,
    },

    /// No download URL could be resolved for the item.
    #[error("No download URL available for {item_id}")]
    UrlUnavailable {
        /// Platform id of the item.
        item_id: String,
    },

    /// Another live job already writes to the same output file.
    #[error("Already queued: {path}")]
    AlreadyQueued {
        /// The contested output path.
        path: String,
    },

    /// Transfer was cancelled by the user.
    #[error("Download cancelled")]
    Cancelled,

    /// Transfer was paused or interrupted and can be resumed.
    #[error("Download interrupted at {bytes_downloaded} bytes")]
    Interrupted {
        /// Bytes on disk when the transfer stopped.
        bytes_downloaded: u64,
    },

    /// The manager is shutting down and accepts no new work.
    #[error("Download manager is shutting down")]
    ShuttingDown,

    /// General/uncategorized error.
    #[error("{message}")]
    Other {
        /// Error message.
        message: String,
    },
}

impl DownloadError {
    /// Create a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
            status_code: None,
        }
    }

    /// Create a network error with HTTP status code.
    pub fn network_with_status(message: impl Into<String>, status_code: u16) -> Self {
        Self::Network {
            message: message.into(),
            status_code: Some(status_code),
        }
    }

    /// Create a not found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Create a URL-unavailable error.
    pub fn url_unavailable(item_id: impl Into<String>) -> Self {
        Self::UrlUnavailable {
            item_id: item_id.into(),
        }
    }

    /// Create an already-queued error.
    pub fn already_queued(path: impl Into<String>) -> Self {
        Self::AlreadyQueued { path: path.into() }
    }

    /// Create a generic error.
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
        }
    }

    /// Whether a retry could plausibly succeed.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Network { .. } | Self::Interrupted { .. } | Self::Io { .. }
        )
    }

    /// Check if this is a cancellation.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Convert to a user-friendly message.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Io { message, .. } => format!("File operation failed: {message}"),
            Self::Network {
                message,
                status_code: Some(code),
            } => format!("Network error (HTTP {code}): {message}"),
            Self::Network { message, .. } => format!("Network error: {message}"),
            Self::NotFound { message } => format!("Not found: {message}"),
            Self::UrlUnavailable { item_id } => {
                format!("The platform did not provide a download link for '{item_id}'.")
            }
            Self::AlreadyQueued { path } => {
                format!("Another download is already writing to {path}.")
            }
            Self::Cancelled => "Download was cancelled.".to_string(),
            Self::Interrupted { bytes_downloaded } => {
                format!("Download interrupted after {bytes_downloaded} bytes. You can resume it.")
            }
            Self::ShuttingDown => "The application is shutting down.".to_string(),
            Self::Other { message } => message.clone(),
        }
    }
}

impl From<std::io::Error> for DownloadError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            kind: format!("{:?}", err.kind()),
            message: err.to_string(),
        }
    }
}
