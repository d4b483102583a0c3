//! History reads and writes.

use anyhow::{bail, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, Transaction};

use crate::download::DownloadStatus;

use super::db::HistoryDb;
use super::types::{HistoryEntry, HistoryStats};

const COLUMNS: &str = "id, url, title, status, progress, total_segments, downloaded_segments, \
                       created_at, completed_at, file_ref, file_size, download_speed, error_message";

fn entry_from_row(row: &SqliteRow) -> HistoryEntry {
    let status: String = row.get("status");
    let progress: i64 = row.get("progress");
    let total_segments: i64 = row.get("total_segments");
    let downloaded_segments: i64 = row.get("downloaded_segments");
    let file_size: Option<i64> = row.get("file_size");
    HistoryEntry {
        id: row.get("id"),
        url: row.get("url"),
        title: row.get("title"),
        status: DownloadStatus::from_str(&status).unwrap_or(DownloadStatus::Failed),
        progress: progress.clamp(0, 100) as u8,
        total_segments: total_segments.max(0) as usize,
        downloaded_segments: downloaded_segments.max(0) as usize,
        created_at: row.get("created_at"),
        completed_at: row.get("completed_at"),
        file_ref: row.get("file_ref"),
        file_size: file_size.map(|s| s.max(0) as u64),
        download_speed: row.get("download_speed"),
        error_message: row.get("error_message"),
    }
}

async fn insert(tx: &mut Transaction<'_, Sqlite>, e: &HistoryEntry) -> Result<()> {
    sqlx::query("DELETE FROM history WHERE id = ?1")
        .bind(&e.id)
        .execute(&mut **tx)
        .await?;
    sqlx::query(
        r#"
        INSERT INTO history (
            id, url, title, status, progress, total_segments, downloaded_segments,
            created_at, completed_at, file_ref, file_size, download_speed, error_message
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
        "#,
    )
    .bind(&e.id)
    .bind(&e.url)
    .bind(&e.title)
    .bind(e.status.as_str())
    .bind(i64::from(e.progress))
    .bind(e.total_segments as i64)
    .bind(e.downloaded_segments as i64)
    .bind(e.created_at)
    .bind(e.completed_at)
    .bind(&e.file_ref)
    .bind(e.file_size.map(|s| s as i64))
    .bind(e.download_speed)
    .bind(&e.error_message)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn trim(tx: &mut Transaction<'_, Sqlite>, limit: usize) -> Result<u64> {
    let removed = sqlx::query(
        r#"
        DELETE FROM history
        WHERE seq NOT IN (SELECT seq FROM history ORDER BY seq DESC LIMIT ?1)
        "#,
    )
    .bind(limit as i64)
    .execute(&mut **tx)
    .await?
    .rows_affected();
    Ok(removed)
}

impl HistoryDb {
    /// Insert or replace `entry` as the newest row, then keep only the newest `limit` rows.
    pub async fn save(&self, entry: &HistoryEntry, limit: usize) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        insert(&mut tx, entry).await?;
        let trimmed = trim(&mut tx, limit).await?;
        tx.commit().await?;
        if trimmed > 0 {
            tracing::debug!(trimmed, "history trimmed to {} entries", limit);
        }
        Ok(())
    }

    /// All entries, newest first.
    pub async fn list(&self) -> Result<Vec<HistoryEntry>> {
        let rows = sqlx::query(&format!("SELECT {} FROM history ORDER BY seq DESC", COLUMNS))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(entry_from_row).collect())
    }

    pub async fn get(&self, id: &str) -> Result<Option<HistoryEntry>> {
        let row = sqlx::query(&format!("SELECT {} FROM history WHERE id = ?1", COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(entry_from_row))
    }

    /// Entries whose title or URL contains `query`, case-insensitively.
    pub async fn search(&self, query: &str) -> Result<Vec<HistoryEntry>> {
        let needle = query.to_lowercase();
        let rows = sqlx::query(&format!(
            "SELECT {} FROM history \
             WHERE instr(lower(title), ?1) > 0 OR instr(lower(url), ?1) > 0 \
             ORDER BY seq DESC",
            COLUMNS
        ))
        .bind(needle)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(entry_from_row).collect())
    }

    pub async fn by_status(&self, status: DownloadStatus) -> Result<Vec<HistoryEntry>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM history WHERE status = ?1 ORDER BY seq DESC",
            COLUMNS
        ))
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(entry_from_row).collect())
    }

    pub async fn stats(&self) -> Result<HistoryStats> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS total,
                   COALESCE(SUM(CASE WHEN status = 'completed' THEN 1 ELSE 0 END), 0) AS completed,
                   COALESCE(SUM(CASE WHEN status = 'failed' THEN 1 ELSE 0 END), 0) AS failed,
                   COALESCE(SUM(file_size), 0) AS total_size
            FROM history
            "#,
        )
        .fetch_one(&self.pool)
        .await?;
        let get = |name: &str| -> u64 { row.get::<i64, _>(name).max(0) as u64 };
        Ok(HistoryStats {
            total_downloads: get("total"),
            completed_downloads: get("completed"),
            failed_downloads: get("failed"),
            total_size: get("total_size"),
        })
    }

    /// Returns true if an entry was removed.
    pub async fn remove(&self, id: &str) -> Result<bool> {
        let affected = sqlx::query("DELETE FROM history WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(affected > 0)
    }

    /// Remove every entry; returns how many there were.
    pub async fn clear(&self) -> Result<u64> {
        let affected = sqlx::query("DELETE FROM history")
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(affected)
    }

    /// Whole history as a pretty-printed JSON array, newest first.
    pub async fn export_json(&self) -> Result<String> {
        let entries = self.list().await?;
        Ok(serde_json::to_string_pretty(&entries)?)
    }

    /// Replace the history with the entries in `json` (a JSON array, newest first).
    ///
    /// Elements missing a required field are dropped. Returns the number imported.
    pub async fn import_json(&self, json: &str, limit: usize) -> Result<usize> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        let serde_json::Value::Array(items) = value else {
            bail!("invalid history format: expected a JSON array");
        };
        let total = items.len();
        let entries: Vec<HistoryEntry> = items
            .into_iter()
            .filter_map(|v| serde_json::from_value::<HistoryEntry>(v).ok())
            .filter(|e| !e.id.is_empty() && !e.url.is_empty() && !e.title.is_empty())
            .take(limit)
            .collect();
        if entries.len() < total {
            tracing::warn!(dropped = total - entries.len(), "history import skipped entries");
        }

        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM history").execute(&mut *tx).await?;
        // Oldest first so the first array element ends up newest.
        for e in entries.iter().rev() {
            insert(&mut tx, e).await?;
        }
        tx.commit().await?;
        Ok(entries.len())
    }
}
