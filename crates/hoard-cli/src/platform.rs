//! Platform client for bare URLs.
//!
//! The CLI downloads direct file URLs, so every item already carries its
//! `file_url` and there is no remote catalogue to search.

use async_trait::async_trait;

use hoard_core::{MediaItem, PlatformClientPort, PlatformError, SearchPage, SearchParams};

/// Platform with no catalogue. Items must carry their own file URL.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectUrlPlatform;

#[async_trait]
impl PlatformClientPort for DirectUrlPlatform {
    async fn search(&self, _params: &SearchParams) -> Result<SearchPage, PlatformError> {
        Ok(SearchPage::default())
    }

    async fn get_media_details(&self, _id: &str) -> Result<Option<MediaItem>, PlatformError> {
        Ok(None)
    }

    async fn get_download_url(&self, _id: &str) -> Result<Option<String>, PlatformError> {
        Ok(None)
    }
}
