//! SQLite-backed history database: connection and schema.

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::{Path, PathBuf};

/// Handle to the history database.
///
/// The default file lives under the XDG state directory:
/// `~/.local/state/hlsdm/history.db`.
#[derive(Clone)]
pub struct HistoryDb {
    pub(crate) pool: Pool<Sqlite>,
}

impl HistoryDb {
    pub fn default_path() -> Result<PathBuf> {
        let state = xdg::BaseDirectories::with_prefix("hlsdm")?.get_state_home();
        Ok(state.join("hlsdm").join("history.db"))
    }

    /// Open (or create) the default history database.
    pub async fn open_default() -> Result<Self> {
        let path = Self::default_path()?;
        Self::open_at(&path)
            .await
            .with_context(|| format!("open history db {}", path.display()))
    }

    /// Open `path`, creating the file and its parent directories on first use.
    pub async fn open_at(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("create {}", parent.display()))?;
        }
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;
        Self::with_pool(pool).await
    }

    async fn with_pool(pool: Pool<Sqlite>) -> Result<Self> {
        let db = HistoryDb { pool };
        db.migrate().await.context("migrate history schema")?;
        Ok(db)
    }

    async fn migrate(&self) -> Result<()> {
        // `seq` orders rows by save time; a re-saved entry gets a fresh seq and moves to the front.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS history (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                url TEXT NOT NULL,
                title TEXT NOT NULL,
                status TEXT NOT NULL,
                progress INTEGER NOT NULL,
                total_segments INTEGER NOT NULL,
                downloaded_segments INTEGER NOT NULL,
                created_at INTEGER NOT NULL,
                completed_at INTEGER,
                file_ref TEXT,
                file_size INTEGER,
                download_speed REAL NOT NULL DEFAULT 0,
                error_message TEXT
            );
            "#,
        )
        .execute(&self.pool)
        .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS history_status ON history (status)")
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

/// Single-connection in-memory database; each call gets a fresh one.
#[cfg(test)]
pub(crate) async fn open_memory() -> Result<HistoryDb> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    HistoryDb::with_pool(pool).await
}
