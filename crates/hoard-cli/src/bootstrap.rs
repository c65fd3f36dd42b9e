//! CLI composition root.
//!
//! Builds every service the commands need from settings: the HTTP adapter,
//! the three caches, the background work queue and the download manager.

use std::sync::Arc;

use anyhow::{Context, Result};

use hoard_cache::{PostCache, ThumbnailCache, ThumbnailCacheConfig, TtlCacheStore};
use hoard_core::{
    BroadcastDownloadEmitter, DownloadManagerConfig, Settings, SettingsProvider, SettingsUpdate,
    StaticSettings, post_cache_path, thumbnail_cache_dir, ttl_cache_dir, validate_settings,
};
use hoard_download::{DownloadManagerDeps, DownloadManagerImpl, build_download_manager};
use hoard_http::{HttpClient, HttpClientConfig};
use hoard_runtime::{WorkQueue, WorkQueueConfig};

use crate::error::CliError;
use crate::parser::Cli;
use crate::platform::DirectUrlPlatform;

/// Configuration for CLI bootstrap.
#[derive(Debug, Clone)]
pub struct CliConfig {
    /// Effective settings after command-line overrides.
    pub settings: Settings,
}

impl CliConfig {
    /// Defaults only.
    pub fn with_defaults() -> Result<Self, CliError> {
        Self::from_update(&SettingsUpdate::default())
    }

    /// Defaults overridden by global command-line options (which clap
    /// already backs with `HOARD_*` environment variables).
    pub fn from_cli(cli: &Cli) -> Result<Self, CliError> {
        let update = SettingsUpdate {
            download_concurrency: cli.concurrency.map(Some),
            thumbnail_cache_max_bytes: cli.thumbnail_budget.map(Some),
            ..SettingsUpdate::default()
        };
        Self::from_update(&update)
    }

    fn from_update(update: &SettingsUpdate) -> Result<Self, CliError> {
        let mut settings = Settings::with_defaults();
        settings.merge(update);
        validate_settings(&settings)?;
        Ok(Self { settings })
    }
}

/// Everything a command handler may use.
pub struct CliContext {
    /// Effective settings.
    pub settings: Arc<dyn SettingsProvider>,
    /// Download manager.
    pub downloads: Arc<DownloadManagerImpl>,
    /// Event source for download progress.
    pub events: Arc<BroadcastDownloadEmitter>,
    /// Namespaced TTL cache.
    pub ttl_cache: TtlCacheStore,
    /// Post/pool cache.
    pub post_cache: PostCache,
    /// Thumbnail cache.
    pub thumbnails: Arc<ThumbnailCache>,
    /// Background work queue.
    pub work_queue: Arc<WorkQueue>,
}

/// Build the CLI context.
pub async fn bootstrap(config: CliConfig) -> Result<CliContext> {
    let settings = config.settings;

    let http = Arc::new(
        HttpClient::new(HttpClientConfig::new()).context("Failed to build HTTP client")?,
    );

    let ttl_cache = TtlCacheStore::open(ttl_cache_dir().map_err(CliError::from)?)
        .await
        .context("Failed to open TTL cache")?;
    let post_cache = PostCache::open(&post_cache_path().map_err(CliError::from)?)
        .await
        .context("Failed to open post cache")?;
    let thumbnail_dir = thumbnail_cache_dir().map_err(CliError::from)?;
    let thumbnails = Arc::new(
        ThumbnailCache::open(
            ThumbnailCacheConfig::from_settings(thumbnail_dir, &settings),
            http.clone(),
        )
        .await
        .context("Failed to open thumbnail cache")?,
    );

    let work_queue = WorkQueue::start(WorkQueueConfig::from_settings(&settings));

    let events = Arc::new(BroadcastDownloadEmitter::new());
    let downloads = build_download_manager(DownloadManagerDeps {
        platform: Arc::new(DirectUrlPlatform),
        byte_source: http,
        event_emitter: Arc::clone(&events),
        config: DownloadManagerConfig::from_settings(&settings),
    });

    tracing::debug!(
        concurrency = ?settings.download_concurrency,
        thumbnail_budget = settings.effective_thumbnail_budget(),
        "CLI context ready"
    );

    Ok(CliContext {
        settings: Arc::new(StaticSettings::new(settings)),
        downloads,
        events,
        ttl_cache,
        post_cache,
        thumbnails,
        work_queue,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn defaults_are_valid() {
        let config = CliConfig::with_defaults().unwrap();
        assert_eq!(config.settings, Settings::with_defaults());
    }

    #[test]
    fn cli_overrides_settings() {
        let cli = Cli::parse_from(["hoard", "--concurrency", "7", "cache", "stats"]);
        let config = CliConfig::from_cli(&cli).unwrap();
        assert_eq!(config.settings.download_concurrency, Some(7));
    }

    #[test]
    fn invalid_override_is_rejected() {
        let cli = Cli::parse_from(["hoard", "--concurrency", "0", "cache", "stats"]);
        let err = CliConfig::from_cli(&cli).unwrap_err();
        assert_eq!(err.exit_code(), 78);
    }
}
