//! SQLite-backed snapshot slot: connection, migration and the slot operations.

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Row, Sqlite};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// Key of the pending-downloads slot.
pub const PENDING_KEY: &str = "pending_downloads";

/// Handle to the snapshot database.
///
/// The default file lives under the XDG state directory:
/// `~/.local/state/sdm/snapshots.db` on Debian.
#[derive(Clone)]
pub struct SnapshotDb {
    pool: Pool<Sqlite>,
}

impl SnapshotDb {
    /// Open (or create) the default snapshot database and run migrations.
    pub async fn open_default() -> Result<Self> {
        let xdg_dirs = xdg::BaseDirectories::with_prefix("sdm")?;
        let db_path = xdg_dirs.get_state_home().join("snapshots.db");
        Self::open_at(&db_path).await
    }

    /// Open (or create) the database at `path`, creating parent dirs if needed.
    pub async fn open_at(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .with_context(|| format!("open snapshot db {}", path.display()))?;
        let db = SnapshotDb { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// In-memory database; contents vanish with the handle.
    pub async fn open_in_memory() -> Result<Self> {
        // One connection, or the pool could hand back a different empty DB.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        let db = SnapshotDb { pool };
        db.migrate().await?;
        Ok(db)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS snapshots (
                key TEXT PRIMARY KEY,
                urls_json TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Replace the pending slot with `urls` (in order).
    pub async fn write_snapshot(&self, urls: &[String]) -> Result<()> {
        let urls_json = serde_json::to_string(urls)?;
        sqlx::query(
            r#"
            INSERT INTO snapshots (key, urls_json, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET
                urls_json = excluded.urls_json,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(PENDING_KEY)
        .bind(urls_json)
        .bind(unix_timestamp())
        .execute(&self.pool)
        .await?;
        tracing::debug!(count = urls.len(), "wrote pending snapshot");
        Ok(())
    }

    /// URLs in the pending slot; empty if the slot was never written or cleared.
    pub async fn read_snapshot(&self) -> Result<Vec<String>> {
        let row = sqlx::query("SELECT urls_json FROM snapshots WHERE key = ?1")
            .bind(PENDING_KEY)
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else {
            return Ok(Vec::new());
        };
        let urls_json: String = row.get("urls_json");
        let urls = serde_json::from_str(&urls_json).context("decode pending snapshot")?;
        Ok(urls)
    }

    pub async fn clear_snapshot(&self) -> Result<()> {
        sqlx::query("DELETE FROM snapshots WHERE key = ?1")
            .bind(PENDING_KEY)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Read the slot and clear it in one transaction, so two starting
    /// processes cannot both restore the same work.
    pub async fn take_snapshot(&self) -> Result<Vec<String>> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query("SELECT urls_json FROM snapshots WHERE key = ?1")
            .bind(PENDING_KEY)
            .fetch_optional(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM snapshots WHERE key = ?1")
            .bind(PENDING_KEY)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        match row {
            Some(row) => {
                let urls_json: String = row.get("urls_json");
                Ok(serde_json::from_str(&urls_json).context("decode pending snapshot")?)
            }
            None => Ok(Vec::new()),
        }
    }

    /// Append `urls` to the pending slot (used to queue work for the next run).
    pub async fn append_urls(&self, urls: &[String]) -> Result<usize> {
        let mut pending = self.read_snapshot().await?;
        pending.extend(urls.iter().cloned());
        self.write_snapshot(&pending).await?;
        Ok(pending.len())
    }
}

fn unix_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}
