//! Settings domain types and validation.
//!
//! Pure data with no persistence format attached; the host decides where
//! settings come from and hands them to the core through a
//! [`SettingsProvider`](crate::ports::SettingsProvider).

use serde::{Deserialize, Serialize};

/// Default number of concurrent transfers.
pub const DEFAULT_DOWNLOAD_CONCURRENCY: u32 = 3;

/// Upper bound for concurrent transfers.
pub const MAX_DOWNLOAD_CONCURRENCY: u32 = 16;

/// Default thumbnail cache budget (256 MiB).
pub const DEFAULT_THUMBNAIL_CACHE_MAX_BYTES: u64 = 256 * 1024 * 1024;

/// Default age after which cached pools should be refreshed.
pub const DEFAULT_POOLS_REFRESH_HOURS: u32 = 24;

/// Default minimum interval between progress events for one job.
pub const DEFAULT_PROGRESS_INTERVAL_MS: u64 = 100;

/// Default number of background work queue workers.
pub const DEFAULT_BACKGROUND_WORKERS: u32 = 8;

/// Application settings structure.
///
/// All fields are optional to support partial updates and graceful defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Maximum concurrent transfers (1-16).
    pub download_concurrency: Option<u32>,

    /// Default destination directory for downloads.
    pub default_download_path: Option<String>,

    /// Thumbnail cache size budget in bytes.
    pub thumbnail_cache_max_bytes: Option<u64>,

    /// Hours after which the cached pool list is considered stale.
    pub pools_refresh_hours: Option<u32>,

    /// Minimum interval between progress events for one job.
    pub progress_interval_ms: Option<u64>,

    /// Number of background work queue workers.
    pub background_workers: Option<u32>,

    /// Destination filename template. Opaque to the core.
    pub filename_template: Option<String>,
}

impl Settings {
    /// Create settings with sensible defaults.
    #[must_use]
    pub const fn with_defaults() -> Self {
        Self {
            download_concurrency: Some(DEFAULT_DOWNLOAD_CONCURRENCY),
            default_download_path: None,
            thumbnail_cache_max_bytes: Some(DEFAULT_THUMBNAIL_CACHE_MAX_BYTES),
            pools_refresh_hours: Some(DEFAULT_POOLS_REFRESH_HOURS),
            progress_interval_ms: Some(DEFAULT_PROGRESS_INTERVAL_MS),
            background_workers: Some(DEFAULT_BACKGROUND_WORKERS),
            filename_template: None,
        }
    }

    /// Effective thumbnail budget (with default fallback).
    #[must_use]
    pub const fn effective_thumbnail_budget(&self) -> u64 {
        match self.thumbnail_cache_max_bytes {
            Some(bytes) => bytes,
            None => DEFAULT_THUMBNAIL_CACHE_MAX_BYTES,
        }
    }

    /// Effective pool refresh age (with default fallback).
    #[must_use]
    pub const fn effective_pools_refresh_hours(&self) -> u32 {
        match self.pools_refresh_hours {
            Some(hours) => hours,
            None => DEFAULT_POOLS_REFRESH_HOURS,
        }
    }

    /// Effective background worker count (with default fallback).
    #[must_use]
    pub const fn effective_background_workers(&self) -> u32 {
        match self.background_workers {
            Some(workers) => workers,
            None => DEFAULT_BACKGROUND_WORKERS,
        }
    }

    /// Merge another settings into this one, only updating fields that are Some.
    pub fn merge(&mut self, other: &SettingsUpdate) {
        if let Some(concurrency) = other.download_concurrency {
            self.download_concurrency = concurrency;
        }
        if let Some(ref path) = other.default_download_path {
            self.default_download_path.clone_from(path);
        }
        if let Some(budget) = other.thumbnail_cache_max_bytes {
            self.thumbnail_cache_max_bytes = budget;
        }
        if let Some(hours) = other.pools_refresh_hours {
            self.pools_refresh_hours = hours;
        }
        if let Some(interval) = other.progress_interval_ms {
            self.progress_interval_ms = interval;
        }
        if let Some(workers) = other.background_workers {
            self.background_workers = workers;
        }
        if let Some(ref template) = other.filename_template {
            self.filename_template.clone_from(template);
        }
    }
}

/// Partial settings update.
///
/// Each field is `Option<Option<T>>`:
/// - `None` = don't change this field
/// - `Some(None)` = set field to None/null
/// - `Some(Some(value))` = set field to value
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[allow(clippy::option_option)]
pub struct SettingsUpdate {
    pub download_concurrency: Option<Option<u32>>,
    pub default_download_path: Option<Option<String>>,
    pub thumbnail_cache_max_bytes: Option<Option<u64>>,
    pub pools_refresh_hours: Option<Option<u32>>,
    pub progress_interval_ms: Option<Option<u64>>,
    pub background_workers: Option<Option<u32>>,
    pub filename_template: Option<Option<String>>,
}

/// Settings validation error.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("Download concurrency must be between 1 and {MAX_DOWNLOAD_CONCURRENCY}, got {0}")]
    InvalidConcurrency(u32),

    #[error("Thumbnail cache budget must be at least 1 MiB, got {0} bytes")]
    InvalidThumbnailBudget(u64),

    #[error("Progress interval must be between 10 and 10,000 ms, got {0}")]
    InvalidProgressInterval(u64),

    #[error("Background workers must be between 1 and 64, got {0}")]
    InvalidBackgroundWorkers(u32),

    #[error("Download path cannot be empty")]
    EmptyDownloadPath,
}

/// Validate settings values.
pub fn validate_settings(settings: &Settings) -> Result<(), SettingsError> {
    if let Some(concurrency) = settings.download_concurrency {
        if !(1..=MAX_DOWNLOAD_CONCURRENCY).contains(&concurrency) {
            return Err(SettingsError::InvalidConcurrency(concurrency));
        }
    }

    if let Some(budget) = settings.thumbnail_cache_max_bytes {
        if budget < 1024 * 1024 {
            return Err(SettingsError::InvalidThumbnailBudget(budget));
        }
    }

    if let Some(interval) = settings.progress_interval_ms {
        if !(10..=10_000).contains(&interval) {
            return Err(SettingsError::InvalidProgressInterval(interval));
        }
    }

    if let Some(workers) = settings.background_workers {
        if !(1..=64).contains(&workers) {
            return Err(SettingsError::InvalidBackgroundWorkers(workers));
        }
    }

    if settings
        .default_download_path
        .as_ref()
        .is_some_and(|p| p.trim().is_empty())
    {
        return Err(SettingsError::EmptyDownloadPath);
    }

    Ok(())
}
