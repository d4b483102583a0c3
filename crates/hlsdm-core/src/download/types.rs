//! Download record and status types.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::ids::DownloadId;

/// Lifecycle state of one download.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadStatus {
    Pending,
    Downloading,
    Completed,
    Failed,
}

impl DownloadStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            DownloadStatus::Pending => "pending",
            DownloadStatus::Downloading => "downloading",
            DownloadStatus::Completed => "completed",
            DownloadStatus::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(DownloadStatus::Pending),
            "downloading" => Some(DownloadStatus::Downloading),
            "completed" => Some(DownloadStatus::Completed),
            "failed" => Some(DownloadStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, DownloadStatus::Completed | DownloadStatus::Failed)
    }
}

/// What ended a failed download.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    /// Playlist could not be resolved (only seen on queue items; single downloads fail in `start`).
    Playlist,
    Segment,
    Merge,
    /// User-initiated; not an error.
    Cancelled,
}

/// Human-readable reason attached to every `failed` download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    pub kind: FailureKind,
    pub message: String,
}

impl Failure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn cancelled() -> Self {
        Self::new(FailureKind::Cancelled, "Download cancelled")
    }

    pub fn is_cancelled(&self) -> bool {
        self.kind == FailureKind::Cancelled
    }
}

/// Point-in-time copy of one stream's state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Download {
    pub id: DownloadId,
    pub url: String,
    pub title: String,
    pub status: DownloadStatus,
    /// 0–100.
    pub progress: u8,
    pub total_segments: usize,
    pub downloaded_segments: usize,
    /// Unix seconds.
    pub created_at: i64,
    #[serde(default)]
    pub completed_at: Option<i64>,
    #[serde(default)]
    pub file_size: Option<u64>,
    /// Location of the merged artifact.
    #[serde(default)]
    pub file_ref: Option<String>,
    #[serde(default)]
    pub failure: Option<Failure>,
}

impl Download {
    pub(crate) fn pending(id: DownloadId, url: &str, title: &str, total_segments: usize) -> Self {
        Self {
            id,
            url: url.to_string(),
            title: title.to_string(),
            status: DownloadStatus::Pending,
            progress: 0,
            total_segments,
            downloaded_segments: 0,
            created_at: unix_timestamp(),
            completed_at: None,
            file_size: None,
            file_ref: None,
            failure: None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.failure.as_ref().is_some_and(Failure::is_cancelled)
    }
}

/// round(100 * done / total), 0 when total is 0.
pub fn percent(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let p = (100.0 * done as f64 / total as f64).round();
    p.clamp(0.0, 100.0) as u8
}

/// Current time as Unix seconds.
pub(crate) fn unix_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_strings_roundtrip() {
        for s in [
            DownloadStatus::Pending,
            DownloadStatus::Downloading,
            DownloadStatus::Completed,
            DownloadStatus::Failed,
        ] {
            assert_eq!(DownloadStatus::from_str(s.as_str()), Some(s));
        }
        assert_eq!(DownloadStatus::from_str("paused"), None);
    }

    #[test]
    fn percent_rounds() {
        assert_eq!(percent(0, 3), 0);
        assert_eq!(percent(1, 3), 33);
        assert_eq!(percent(2, 3), 67);
        assert_eq!(percent(3, 3), 100);
        assert_eq!(percent(1, 0), 0);
    }

    #[test]
    fn cancelled_failure_is_distinguishable() {
        let mut d = Download::pending(DownloadId::from(1), "https://x/a.m3u8", "a", 2);
        assert!(!d.is_cancelled());
        d.failure = Some(Failure::cancelled());
        assert!(d.is_cancelled());
        d.failure = Some(Failure::new(FailureKind::Segment, "segment 1: HTTP 404"));
        assert!(!d.is_cancelled());
    }
}
