//! Shared `SQLite` setup for the cache storage units.

use std::path::Path;
use std::time::Duration;

use hoard_core::CacheError;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};

/// Connections per storage unit. `SQLite` serializes writers anyway.
const MAX_CONNECTIONS: u32 = 4;

/// Open (creating if missing) the database file at `path`.
pub(crate) async fn open_pool(path: &Path) -> Result<SqlitePool, CacheError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    SqlitePoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .connect_with(
            SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
                .busy_timeout(Duration::from_secs(5)),
        )
        .await
        .map_err(storage_err)
}

/// Map a storage-layer error into the domain error.
pub(crate) fn storage_err(err: sqlx::Error) -> CacheError {
    CacheError::Storage(err.to_string())
}

/// Current time as unix milliseconds, the on-disk timestamp format.
pub(crate) fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
