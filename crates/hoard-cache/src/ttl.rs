//! Generic TTL key/value cache store.
//!
//! Each cache name maps to its own `SQLite` file under the store root, so
//! clearing or corrupting one namespace never touches another. Entries carry
//! an absolute expiry in unix milliseconds and are treated as absent once it
//! has passed, whether or not a purge pass has deleted them yet.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use hoard_core::{CacheError, DirectoryCreationStrategy, ensure_directory};
use serde::Serialize;
use serde::de::DeserializeOwned;
use sqlx::{Row, SqlitePool};
use tokio::sync::Mutex;

use crate::sqlite::{now_millis, open_pool, storage_err};

const DB_EXTENSION: &str = "db";
const MAX_NAMESPACE_LEN: usize = 64;

/// Namespaced key to JSON value store with per-entry expiration.
pub struct TtlCacheStore {
    root: PathBuf,
    /// Lazily opened storage units keyed by cache name.
    pools: Mutex<HashMap<String, SqlitePool>>,
}

impl TtlCacheStore {
    /// Open the store rooted at `root`, creating the directory if needed.
    ///
    /// Failure here means no TTL cache is usable and should abort startup.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let root = root.into();
        ensure_directory(&root, DirectoryCreationStrategy::AutoCreate)
            .map_err(|e| CacheError::Storage(e.to_string()))?;

        tracing::debug!(target: "hoard.cache", root = %root.display(), "TTL cache store opened");

        Ok(Self {
            root,
            pools: Mutex::new(HashMap::new()),
        })
    }

    /// Directory holding the per-namespace files.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Look up `key`, logging and hiding any storage failure.
    pub async fn get<T: DeserializeOwned>(&self, cache_name: &str, key: &str) -> Option<T> {
        match self.try_get(cache_name, key).await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(
                    target: "hoard.cache",
                    namespace = %cache_name,
                    key = %key,
                    error = %e,
                    "TTL cache read failed, treating as miss"
                );
                None
            }
        }
    }

    /// Look up `key`. Expired entries are `Ok(None)`.
    pub async fn try_get<T: DeserializeOwned>(
        &self,
        cache_name: &str,
        key: &str,
    ) -> Result<Option<T>, CacheError> {
        let pool = self.pool(cache_name).await?;
        let row = sqlx::query("SELECT value, expires_at FROM entries WHERE key = ?")
            .bind(key)
            .fetch_optional(&pool)
            .await
            .map_err(storage_err)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let expires_at: i64 = row.get("expires_at");
        if now_millis() > expires_at {
            return Ok(None);
        }

        let json: String = row.get("value");
        Ok(Some(serde_json::from_str(&json)?))
    }

    /// Upsert `key`, logging and hiding any storage failure.
    pub async fn set<T: Serialize + ?Sized>(
        &self,
        cache_name: &str,
        key: &str,
        value: &T,
        expires_at: DateTime<Utc>,
    ) {
        if let Err(e) = self.try_set(cache_name, key, value, expires_at).await {
            tracing::warn!(
                target: "hoard.cache",
                namespace = %cache_name,
                key = %key,
                error = %e,
                "TTL cache write failed"
            );
        }
    }

    /// Upsert `key`, overwriting any existing entry unconditionally.
    pub async fn try_set<T: Serialize + ?Sized>(
        &self,
        cache_name: &str,
        key: &str,
        value: &T,
        expires_at: DateTime<Utc>,
    ) -> Result<(), CacheError> {
        let json = serde_json::to_string(value)?;
        let pool = self.pool(cache_name).await?;

        sqlx::query(
            r"
            INSERT INTO entries (key, value, expires_at) VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                expires_at = excluded.expires_at
            ",
        )
        .bind(key)
        .bind(&json)
        .bind(expires_at.timestamp_millis())
        .execute(&pool)
        .await
        .map_err(storage_err)?;

        Ok(())
    }

    /// Delete one entry. Returns whether it existed.
    pub async fn remove(&self, cache_name: &str, key: &str) -> Result<bool, CacheError> {
        let pool = self.pool(cache_name).await?;
        let result = sqlx::query("DELETE FROM entries WHERE key = ?")
            .bind(key)
            .execute(&pool)
            .await
            .map_err(storage_err)?;
        Ok(result.rows_affected() > 0)
    }

    /// Drop every entry of one namespace. Returns the number removed.
    pub async fn clear(&self, cache_name: &str) -> Result<u64, CacheError> {
        let pool = self.pool(cache_name).await?;
        let result = sqlx::query("DELETE FROM entries")
            .execute(&pool)
            .await
            .map_err(storage_err)?;

        tracing::info!(
            target: "hoard.cache",
            namespace = %cache_name,
            removed = result.rows_affected(),
            "TTL cache cleared"
        );
        Ok(result.rows_affected())
    }

    /// Physically delete expired entries of one namespace.
    pub async fn purge_expired(&self, cache_name: &str) -> Result<u64, CacheError> {
        let pool = self.pool(cache_name).await?;
        let result = sqlx::query("DELETE FROM entries WHERE expires_at < ?")
            .bind(now_millis())
            .execute(&pool)
            .await
            .map_err(storage_err)?;

        tracing::debug!(
            target: "hoard.cache",
            namespace = %cache_name,
            purged = result.rows_affected(),
            "Purged expired entries"
        );
        Ok(result.rows_affected())
    }

    /// Number of live (unexpired) entries in a namespace.
    pub async fn count(&self, cache_name: &str) -> Result<u64, CacheError> {
        let pool = self.pool(cache_name).await?;
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM entries WHERE expires_at >= ?")
            .bind(now_millis())
            .fetch_one(&pool)
            .await
            .map_err(storage_err)?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    /// Names of every namespace that has a storage unit on disk.
    pub async fn namespaces(&self) -> Result<Vec<String>, CacheError> {
        let mut names = Vec::new();
        let mut dir = tokio::fs::read_dir(&self.root).await?;
        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(DB_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if validate_namespace(stem).is_ok() {
                    names.push(stem.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    /// Clear every namespace. Returns the total number of entries removed.
    pub async fn clear_all(&self) -> Result<u64, CacheError> {
        let mut total = 0;
        for name in self.namespaces().await? {
            total += self.clear(&name).await?;
        }
        Ok(total)
    }

    /// Get (opening on first use) the storage unit of a namespace.
    async fn pool(&self, cache_name: &str) -> Result<SqlitePool, CacheError> {
        validate_namespace(cache_name)?;

        let mut pools = self.pools.lock().await;
        if let Some(pool) = pools.get(cache_name) {
            return Ok(pool.clone());
        }

        let path = self.root.join(format!("{cache_name}.{DB_EXTENSION}"));
        let pool = open_pool(&path).await?;
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS entries (
                key TEXT PRIMARY KEY NOT NULL,
                value TEXT NOT NULL,
                expires_at INTEGER NOT NULL
            )
            ",
        )
        .execute(&pool)
        .await
        .map_err(storage_err)?;

        tracing::debug!(target: "hoard.cache", namespace = %cache_name, "Opened TTL namespace");
        pools.insert(cache_name.to_string(), pool.clone());
        Ok(pool)
    }
}

/// Cache names become file names, so only a safe alphabet is accepted.
fn validate_namespace(name: &str) -> Result<(), CacheError> {
    let valid = !name.is_empty()
        && name.len() <= MAX_NAMESPACE_LEN
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(CacheError::InvalidNamespace(name.to_string()))
    }
}
