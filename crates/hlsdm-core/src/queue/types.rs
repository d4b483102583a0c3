//! Queue, item, and queue-progress types.

use serde::{Deserialize, Serialize};

use crate::download::{DownloadStatus, Failure};
use crate::ids::{DownloadId, ItemId, QueueId};

/// Lifecycle state of a queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueStatus {
    Idle,
    Running,
    Paused,
    Completed,
    Failed,
}

impl QueueStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            QueueStatus::Idle => "idle",
            QueueStatus::Running => "running",
            QueueStatus::Paused => "paused",
            QueueStatus::Completed => "completed",
            QueueStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, QueueStatus::Completed | QueueStatus::Failed)
    }
}

impl std::fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One slot of a queue. `id` is stable; `download_id` is the current attempt's download.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueItem {
    pub id: ItemId,
    pub queue_id: QueueId,
    pub url: String,
    pub title: String,
    pub status: DownloadStatus,
    pub progress: u8,
    #[serde(default)]
    pub download_id: Option<DownloadId>,
    pub total_segments: usize,
    pub downloaded_segments: usize,
    /// Submission order; dispatch follows it.
    pub priority: usize,
    pub retry_count: u32,
    pub max_retries: u32,
    pub added_at: i64,
    #[serde(default)]
    pub completed_at: Option<i64>,
    #[serde(default)]
    pub file_size: Option<u64>,
    #[serde(default)]
    pub file_ref: Option<String>,
    /// Last failure; kept across retries so the latest reason stays visible.
    #[serde(default)]
    pub failure: Option<Failure>,
}

impl QueueItem {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Back to `pending` with segment progress cleared; retry count survives.
    pub(crate) fn reset(&mut self) {
        self.status = DownloadStatus::Pending;
        self.progress = 0;
        self.downloaded_segments = 0;
        self.download_id = None;
    }
}

/// A named batch of downloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadQueue {
    pub id: QueueId,
    pub name: String,
    pub items: Vec<QueueItem>,
    pub status: QueueStatus,
    pub max_concurrent: usize,
    pub created_at: i64,
    #[serde(default)]
    pub completed_at: Option<i64>,
    pub total_items: usize,
    pub completed_items: usize,
    pub failed_items: usize,
}

impl DownloadQueue {
    pub fn all_items_terminal(&self) -> bool {
        self.items.iter().all(QueueItem::is_terminal)
    }

    pub fn active_items(&self) -> usize {
        self.items
            .iter()
            .filter(|i| i.status == DownloadStatus::Downloading)
            .count()
    }
}

/// Queue-level event published after every change to a queue or one of its items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueProgress {
    pub queue_id: QueueId,
    pub total_items: usize,
    pub completed_items: usize,
    pub failed_items: usize,
    pub active_items: usize,
    /// round(100 * (completed + failed) / total).
    pub overall_progress: u8,
    /// Sum of the active items' download speeds, bytes per second.
    pub total_speed: f64,
    /// Seconds.
    pub estimated_time_remaining: u64,
    pub status: QueueStatus,
}

/// Rejected queue operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    #[error("no URLs provided")]
    EmptyBatch,
    #[error("queue {0} not found")]
    NotFound(QueueId),
    #[error("cannot {op} a queue that is {from}")]
    InvalidTransition { from: QueueStatus, op: &'static str },
}
