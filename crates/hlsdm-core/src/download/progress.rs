//! Per-download progress events and throughput/ETA math.
//!
//! Rates are recomputed from totals on every event (no smoothing):
//! speed = bytes / elapsed, ETA = remaining segments × average segment size / speed.

use serde::{Deserialize, Serialize};

use crate::ids::DownloadId;

use super::types::DownloadStatus;

/// Event published after every state change of a download.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadProgress {
    pub download_id: DownloadId,
    /// 0–100.
    pub progress: u8,
    /// Segments downloaded so far.
    pub current_segment: usize,
    pub total_segments: usize,
    /// Bytes per second since the download started.
    pub download_speed: f64,
    /// Estimated seconds remaining (0 when unknown or not downloading).
    pub eta: u64,
    pub status: DownloadStatus,
    #[serde(default)]
    pub error: Option<String>,
    /// True when the failure was a user cancel (callers should not show it as an error).
    #[serde(default)]
    pub cancelled: bool,
}

/// Totals accumulated by the segment completion handler.
#[derive(Debug, Clone, Copy, Default)]
pub struct RateStats {
    pub total_bytes: u64,
    pub completed_segments: usize,
    pub total_segments: usize,
    pub elapsed_secs: f64,
}

impl RateStats {
    /// Bytes per second (0 if no time has elapsed).
    pub fn bytes_per_sec(&self) -> f64 {
        if self.elapsed_secs <= 0.0 {
            return 0.0;
        }
        self.total_bytes as f64 / self.elapsed_secs
    }

    /// Average bytes per completed segment (None before the first completion).
    pub fn avg_segment_bytes(&self) -> Option<f64> {
        (self.completed_segments > 0).then(|| self.total_bytes as f64 / self.completed_segments as f64)
    }

    /// Seconds remaining, rounded; 0 unless `downloading` and throughput is known.
    pub fn eta_secs(&self, downloading: bool) -> u64 {
        let speed = self.bytes_per_sec();
        if !downloading || speed <= 0.0 {
            return 0;
        }
        let Some(avg) = self.avg_segment_bytes() else {
            return 0;
        };
        let remaining = self.total_segments.saturating_sub(self.completed_segments) as f64;
        (remaining * avg / speed).round() as u64
    }
}
