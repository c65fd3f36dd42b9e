//! Remote platform client port.
//!
//! A platform client knows how to search a content platform and resolve a
//! media item's download URL. The download manager only uses it as a URL
//! resolver when an item carries no direct file URL.

use async_trait::async_trait;
use thiserror::Error;

use crate::media::{MediaItem, SearchPage, SearchParams};

/// Errors from platform client operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PlatformError {
    /// API rate limit exceeded.
    #[error("Rate limit exceeded, try again later")]
    RateLimited,

    /// Authentication required or failed.
    #[error("Authentication required: {message}")]
    AuthRequired {
        /// Platform-provided detail.
        message: String,
    },

    /// Network or connectivity error.
    #[error("Network error: {message}")]
    Network {
        /// Description of the network error.
        message: String,
    },

    /// Invalid response from the API.
    #[error("Invalid API response: {message}")]
    InvalidResponse {
        /// What was invalid.
        message: String,
    },
}

impl PlatformError {
    /// Create a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }
}

/// Port trait for a remote content platform.
///
/// Implementations live outside the core (one adapter per platform). Missing
/// items are `Ok(None)`, never an error.
#[async_trait]
pub trait PlatformClientPort: Send + Sync {
    /// Search the platform.
    async fn search(&self, params: &SearchParams) -> Result<SearchPage, PlatformError>;

    /// Fetch full details of a single item.
    async fn get_media_details(&self, id: &str) -> Result<Option<MediaItem>, PlatformError>;

    /// Resolve the direct download URL of an item.
    async fn get_download_url(&self, id: &str) -> Result<Option<String>, PlatformError>;
}
