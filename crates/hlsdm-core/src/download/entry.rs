//! Registry record for one download: state under a lock, its cancel token,
//! and a terminal-state latch.

use std::sync::{Mutex, MutexGuard};
use std::time::Instant;
use tokio::sync::watch;

use crate::cancel::CancelToken;
use crate::merge::MergedArtifact;

use super::progress::{DownloadProgress, RateStats};
use super::types::{percent, unix_timestamp, Download, DownloadStatus, Failure};

pub(crate) struct EntryState {
    pub(crate) record: Download,
    started: Option<Instant>,
    total_bytes: u64,
}

pub(crate) struct DownloadEntry {
    state: Mutex<EntryState>,
    pub(crate) cancel: CancelToken,
    done: watch::Sender<bool>,
}

impl DownloadEntry {
    pub(crate) fn new(record: Download) -> Self {
        let (done, _) = watch::channel(false);
        Self {
            state: Mutex::new(EntryState {
                record,
                started: None,
                total_bytes: 0,
            }),
            cancel: CancelToken::new(),
            done,
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, EntryState> {
        // Every mutation leaves the record consistent, so a poisoned lock is still usable.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn snapshot(&self) -> Download {
        self.lock().record.clone()
    }

    pub(crate) fn bytes_so_far(&self) -> u64 {
        self.lock().total_bytes
    }

    pub(crate) fn progress(&self) -> DownloadProgress {
        let st = self.lock();
        let r = &st.record;
        let stats = RateStats {
            total_bytes: st.total_bytes,
            completed_segments: r.downloaded_segments,
            total_segments: r.total_segments,
            elapsed_secs: st.started.map(|t| t.elapsed().as_secs_f64()).unwrap_or(0.0),
        };
        let downloading = r.status == DownloadStatus::Downloading;
        DownloadProgress {
            download_id: r.id,
            progress: r.progress,
            current_segment: r.downloaded_segments,
            total_segments: r.total_segments,
            download_speed: stats.bytes_per_sec(),
            eta: stats.eta_secs(downloading),
            status: r.status,
            error: r.failure.as_ref().map(|f| f.message.clone()),
            cancelled: r.failure.as_ref().is_some_and(Failure::is_cancelled),
        }
    }

    /// pending → downloading. False if the download already ended (e.g. cancelled while pending).
    pub(crate) fn begin(&self) -> bool {
        let mut st = self.lock();
        if st.record.status != DownloadStatus::Pending || self.cancel.is_cancelled() {
            return false;
        }
        st.record.status = DownloadStatus::Downloading;
        st.started = Some(Instant::now());
        true
    }

    /// Account one fetched segment. `store` runs under the record lock so the
    /// buffer and the counters move together. Rejected once the download has
    /// stopped, which keeps byte totals frozen after cancel.
    pub(crate) fn record_segment(&self, len: u64, store: impl FnOnce()) -> bool {
        let mut st = self.lock();
        if st.record.status != DownloadStatus::Downloading || self.cancel.is_cancelled() {
            return false;
        }
        store();
        st.total_bytes += len;
        let r = &mut st.record;
        r.downloaded_segments = (r.downloaded_segments + 1).min(r.total_segments);
        r.progress = percent(r.downloaded_segments, r.total_segments);
        true
    }

    /// Any non-terminal state → failed. False if already terminal.
    pub(crate) fn fail(&self, failure: Failure) -> bool {
        {
            let mut st = self.lock();
            if st.record.status.is_terminal() {
                return false;
            }
            st.record.status = DownloadStatus::Failed;
            st.record.failure = Some(failure);
        }
        self.done.send_replace(true);
        true
    }

    /// downloading → completed with the merged artifact. False if it ended meanwhile.
    pub(crate) fn complete(&self, artifact: &MergedArtifact) -> bool {
        {
            let mut st = self.lock();
            if st.record.status != DownloadStatus::Downloading || self.cancel.is_cancelled() {
                return false;
            }
            let r = &mut st.record;
            r.status = DownloadStatus::Completed;
            r.progress = 100;
            r.downloaded_segments = r.total_segments;
            r.completed_at = Some(unix_timestamp());
            r.file_size = Some(artifact.total_bytes);
            r.file_ref = Some(artifact.location.clone());
        }
        self.done.send_replace(true);
        true
    }

    /// Resolves once the download is terminal.
    pub(crate) async fn finished(&self) {
        let mut rx = self.done.subscribe();
        // The sender lives as long as `self`, so this only returns once the latch is set.
        let _ = rx.wait_for(|done| *done).await;
    }
}
