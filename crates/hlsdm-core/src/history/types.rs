//! Types stored in the history database.

use serde::{Deserialize, Serialize};

use crate::download::{Download, DownloadStatus};

/// One finished (or abandoned) download as remembered across runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// `<created_at>-<download number>`; download ids restart every process.
    pub id: String,
    pub url: String,
    pub title: String,
    pub status: DownloadStatus,
    pub progress: u8,
    pub total_segments: usize,
    pub downloaded_segments: usize,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub completed_at: Option<i64>,
    #[serde(default)]
    pub file_ref: Option<String>,
    #[serde(default)]
    pub file_size: Option<u64>,
    /// Bytes per second of the last progress event.
    #[serde(default)]
    pub download_speed: f64,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl HistoryEntry {
    pub fn from_download(d: &Download, download_speed: f64) -> Self {
        Self {
            id: format!("{}-{}", d.created_at, d.id.get()),
            url: d.url.clone(),
            title: d.title.clone(),
            status: d.status,
            progress: d.progress,
            total_segments: d.total_segments,
            downloaded_segments: d.downloaded_segments,
            created_at: d.created_at,
            completed_at: d.completed_at,
            file_ref: d.file_ref.clone(),
            file_size: d.file_size,
            download_speed,
            error_message: d.failure.as_ref().map(|f| f.message.clone()),
        }
    }
}

/// Totals over the whole history.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HistoryStats {
    pub total_downloads: u64,
    pub completed_downloads: u64,
    pub failed_downloads: u64,
    /// Sum of known file sizes, bytes.
    pub total_size: u64,
}
