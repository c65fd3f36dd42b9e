//! Cache error types.
//!
//! A cache miss is never an error: lookups return `Option`. These types cover
//! storage and fetch failures only.

use thiserror::Error;

/// Failure of a key/value or structured cache operation.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The backing store rejected the operation.
    #[error("Cache storage error: {0}")]
    Storage(String),

    /// A value could not be serialized or deserialized.
    #[error("Cache serialization error: {0}")]
    Serialization(String),

    /// The cache name cannot be mapped to a storage unit.
    #[error("Invalid cache namespace: {0}")]
    InvalidNamespace(String),

    /// Filesystem error around the storage unit.
    #[error("Cache I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Failure of a thumbnail lookup that had to go to the network.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ThumbnailError {
    /// The remote fetch failed.
    #[error("Thumbnail fetch failed for {url}: {message}")]
    Fetch {
        /// Requested URL.
        url: String,
        /// Underlying failure.
        message: String,
    },

    /// Neither the cache directory nor the temp fallback could be written.
    #[error("Thumbnail storage failed: {0}")]
    Storage(String),

    /// The caller cancelled the lookup.
    #[error("Thumbnail fetch cancelled")]
    Cancelled,
}

impl ThumbnailError {
    /// Create a fetch error.
    pub fn fetch(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Fetch {
            url: url.into(),
            message: message.into(),
        }
    }
}
