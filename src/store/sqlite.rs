// SQLite lifetime stats table. One TEXT blob per device, upserted on every save.

use async_trait::async_trait;
use sqlx::Row;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use tracing::instrument;

use super::StatsStore;

pub struct SqliteStatsStore {
    pool: SqlitePool,
}

impl SqliteStatsStore {
    /// Connect to SQLite at `path`, create parent dir and DB if missing, enable WAL + pragmas.
    pub async fn connect(path: &str, max_pool_size: u32) -> anyhow::Result<Self> {
        if let Some(parent) = Path::new(path).parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}", path))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .busy_timeout(std::time::Duration::from_secs(5))
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_pool_size)
            .connect_with(opts)
            .await?;
        Ok(Self { pool })
    }

    pub async fn init(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS lifetime_stats (
                serial_number TEXT PRIMARY KEY,
                data TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Serial numbers with stored lifetime stats, most recently written first.
    pub async fn list_serials(&self) -> anyhow::Result<Vec<String>> {
        let rows =
            sqlx::query("SELECT serial_number FROM lifetime_stats ORDER BY updated_at DESC")
                .fetch_all(&self.pool)
                .await?;
        rows.iter()
            .map(|row| row.try_get("serial_number").map_err(Into::into))
            .collect()
    }

    /// Drops a device's lifetime stats. Returns whether a row existed.
    #[instrument(skip(self), fields(store = "sqlite", operation = "delete"))]
    pub async fn delete(&self, serial_number: &str) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM lifetime_stats WHERE serial_number = $1")
            .bind(serial_number)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl StatsStore for SqliteStatsStore {
    #[instrument(skip(self), fields(store = "sqlite", operation = "get"))]
    async fn get(&self, serial_number: &str) -> anyhow::Result<Option<String>> {
        let row = sqlx::query("SELECT data FROM lifetime_stats WHERE serial_number = $1")
            .bind(serial_number)
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(row.try_get("data")?))
    }

    #[instrument(skip(self, blob), fields(store = "sqlite", operation = "set", blob_len = blob.len()))]
    async fn set(&self, serial_number: &str, blob: &str) -> anyhow::Result<()> {
        let now_ms = chrono::Utc::now().timestamp_millis();
        sqlx::query(
            "INSERT INTO lifetime_stats (serial_number, data, updated_at) VALUES ($1, $2, $3)
             ON CONFLICT(serial_number) DO UPDATE SET data = excluded.data, updated_at = excluded.updated_at",
        )
        .bind(serial_number)
        .bind(blob)
        .bind(now_ms)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
