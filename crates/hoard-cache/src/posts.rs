//! Structured post/pool cache.
//!
//! Stores pool summaries, post bodies and pool membership in one `SQLite`
//! file. Posts are keyed by `(source, id)`, so equal ids from two platforms
//! never collide. A post body is stored once no matter how many pools
//! reference it; membership rows only carry the pool id, the post key and
//! insertion position.

use std::path::Path;

use chrono::{DateTime, Utc};
use hoard_core::{CacheError, MediaItem, PoolInfo};
use sqlx::{Row, SqlitePool};

use crate::sqlite::{now_millis, open_pool, storage_err};

const POOLS_SAVED_AT_KEY: &str = "pools_saved_at";

/// Bumped whenever a table changes shape. Older post tables are dropped,
/// the rows are only a cache.
const SCHEMA_VERSION: i64 = 2;

/// Typed cache of pools and posts.
#[derive(Clone)]
pub struct PostCache {
    pool: SqlitePool,
}

impl PostCache {
    /// Open (creating if missing) the cache database at `path`.
    ///
    /// Failure here should abort startup.
    pub async fn open(path: &Path) -> Result<Self, CacheError> {
        let pool = open_pool(path).await?;
        let cache = Self { pool };
        cache.ensure_schema().await?;

        tracing::debug!(target: "hoard.cache", path = %path.display(), "Post cache opened");
        Ok(cache)
    }

    async fn ensure_schema(&self) -> Result<(), CacheError> {
        let version: i64 = sqlx::query_scalar("PRAGMA user_version")
            .fetch_one(&self.pool)
            .await
            .map_err(storage_err)?;
        if version < SCHEMA_VERSION {
            for sql in ["DROP TABLE IF EXISTS pool_posts", "DROP TABLE IF EXISTS posts"] {
                sqlx::query(sql)
                    .execute(&self.pool)
                    .await
                    .map_err(storage_err)?;
            }
        }

        let statements = [
            r"
            CREATE TABLE IF NOT EXISTS pools (
                id INTEGER PRIMARY KEY NOT NULL,
                name TEXT NOT NULL,
                post_count INTEGER NOT NULL
            )
            ",
            r"
            CREATE TABLE IF NOT EXISTS posts (
                source TEXT NOT NULL,
                id TEXT NOT NULL,
                data TEXT NOT NULL,
                updated_at INTEGER NOT NULL,
                PRIMARY KEY (source, id)
            )
            ",
            r"
            CREATE TABLE IF NOT EXISTS pool_posts (
                pool_id INTEGER NOT NULL,
                post_source TEXT NOT NULL,
                post_id TEXT NOT NULL,
                position INTEGER NOT NULL,
                PRIMARY KEY (pool_id, post_source, post_id)
            )
            ",
            "CREATE INDEX IF NOT EXISTS idx_pool_posts_order ON pool_posts(pool_id, position)",
            r"
            CREATE TABLE IF NOT EXISTS meta (
                key TEXT PRIMARY KEY NOT NULL,
                value TEXT NOT NULL
            )
            ",
        ];

        for sql in statements {
            sqlx::query(sql)
                .execute(&self.pool)
                .await
                .map_err(storage_err)?;
        }
        sqlx::query(&format!("PRAGMA user_version = {SCHEMA_VERSION}"))
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Pools
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert or update pool summaries and stamp the pools-saved time.
    pub async fn upsert_pools(&self, pools: &[PoolInfo]) -> Result<(), CacheError> {
        let mut tx = self.pool.begin().await.map_err(storage_err)?;

        for pool in pools {
            sqlx::query(
                r"
                INSERT INTO pools (id, name, post_count) VALUES (?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    name = excluded.name,
                    post_count = excluded.post_count
                ",
            )
            .bind(pool.id)
            .bind(&pool.name)
            .bind(i64::from(pool.post_count))
            .execute(&mut *tx)
            .await
            .map_err(storage_err)?;
        }

        sqlx::query("INSERT OR REPLACE INTO meta (key, value) VALUES (?, ?)")
            .bind(POOLS_SAVED_AT_KEY)
            .bind(Utc::now().to_rfc3339())
            .execute(&mut *tx)
            .await
            .map_err(storage_err)?;

        tx.commit().await.map_err(storage_err)?;

        tracing::debug!(target: "hoard.cache", count = pools.len(), "Pools upserted");
        Ok(())
    }

    /// Every cached pool, ordered by id.
    pub async fn get_all_pools(&self) -> Result<Vec<PoolInfo>, CacheError> {
        let rows = sqlx::query("SELECT id, name, post_count FROM pools ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(storage_err)?;

        Ok(rows
            .iter()
            .map(|row| {
                let post_count: i64 = row.get("post_count");
                PoolInfo::new(
                    row.get("id"),
                    row.get::<String, _>("name"),
                    u32::try_from(post_count).unwrap_or(u32::MAX),
                )
            })
            .collect())
    }

    /// When pools were last upserted, if ever.
    pub async fn get_pools_saved_at(&self) -> Result<Option<DateTime<Utc>>, CacheError> {
        let value: Option<String> = sqlx::query_scalar("SELECT value FROM meta WHERE key = ?")
            .bind(POOLS_SAVED_AT_KEY)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;

        Ok(value
            .and_then(|v| DateTime::parse_from_rfc3339(&v).ok())
            .map(|dt| dt.with_timezone(&Utc)))
    }

    /// Whether the pool list is missing or older than `max_age_hours`.
    pub async fn pools_stale(&self, max_age_hours: u32) -> Result<bool, CacheError> {
        Ok(self.get_pools_saved_at().await?.is_none_or(|saved| {
            Utc::now() - saved > chrono::Duration::hours(i64::from(max_age_hours))
        }))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Posts
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert or update posts, recording membership in `pool_id` if given.
    ///
    /// A post already in the pool keeps its original position.
    pub async fn upsert_posts(
        &self,
        posts: &[MediaItem],
        pool_id: Option<i64>,
    ) -> Result<(), CacheError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await.map_err(storage_err)?;

        for post in posts {
            let mut stored = post.clone();
            stored.last_fetched_at.get_or_insert(now);
            let data = serde_json::to_string(&stored)?;

            sqlx::query(
                r"
                INSERT INTO posts (source, id, data, updated_at) VALUES (?, ?, ?, ?)
                ON CONFLICT(source, id) DO UPDATE SET
                    data = excluded.data,
                    updated_at = excluded.updated_at
                ",
            )
            .bind(&post.source)
            .bind(&post.id)
            .bind(&data)
            .bind(now_millis())
            .execute(&mut *tx)
            .await
            .map_err(storage_err)?;

            if let Some(pool_id) = pool_id {
                sqlx::query(
                    r"
                    INSERT OR IGNORE INTO pool_posts (pool_id, post_source, post_id, position)
                    VALUES (?, ?, ?, (SELECT COALESCE(MAX(position), -1) + 1
                                      FROM pool_posts WHERE pool_id = ?))
                    ",
                )
                .bind(pool_id)
                .bind(&post.source)
                .bind(&post.id)
                .bind(pool_id)
                .execute(&mut *tx)
                .await
                .map_err(storage_err)?;
            }
        }

        tx.commit().await.map_err(storage_err)?;

        tracing::debug!(
            target: "hoard.cache",
            count = posts.len(),
            pool_id = ?pool_id,
            "Posts upserted"
        );
        Ok(())
    }

    /// Posts of a pool in membership order.
    pub async fn get_pool_posts(&self, pool_id: i64) -> Result<Vec<MediaItem>, CacheError> {
        let rows = sqlx::query(
            r"
            SELECT p.data
            FROM pool_posts pp
            JOIN posts p ON p.source = pp.post_source AND p.id = pp.post_id
            WHERE pp.pool_id = ?
            ORDER BY pp.position ASC
            ",
        )
        .bind(pool_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;

        rows.iter()
            .map(|row| {
                let data: String = row.get("data");
                serde_json::from_str(&data).map_err(CacheError::from)
            })
            .collect()
    }

    /// A single post by its platform and id.
    pub async fn get_post(&self, source: &str, id: &str) -> Result<Option<MediaItem>, CacheError> {
        let data: Option<String> =
            sqlx::query_scalar("SELECT data FROM posts WHERE source = ? AND id = ?")
                .bind(source)
                .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;

        data.map(|d| serde_json::from_str(&d).map_err(CacheError::from))
            .transpose()
    }

    /// Row counts as `(pools, posts, memberships)`.
    pub async fn counts(&self) -> Result<(u64, u64, u64), CacheError> {
        let count = |sql: &'static str| async move {
            let n: i64 = sqlx::query_scalar(sql)
                .fetch_one(&self.pool)
                .await
                .map_err(storage_err)?;
            Ok::<u64, CacheError>(u64::try_from(n).unwrap_or(0))
        };
        Ok((
            count("SELECT COUNT(*) FROM pools").await?,
            count("SELECT COUNT(*) FROM posts").await?,
            count("SELECT COUNT(*) FROM pool_posts").await?,
        ))
    }

    /// Drop every pool, post and membership row.
    pub async fn clear(&self) -> Result<(), CacheError> {
        let mut tx = self.pool.begin().await.map_err(storage_err)?;
        for sql in [
            "DELETE FROM pool_posts",
            "DELETE FROM posts",
            "DELETE FROM pools",
            "DELETE FROM meta",
        ] {
            sqlx::query(sql)
                .execute(&mut *tx)
                .await
                .map_err(storage_err)?;
        }
        tx.commit().await.map_err(storage_err)?;

        tracing::info!(target: "hoard.cache", "Post cache cleared");
        Ok(())
    }
}
