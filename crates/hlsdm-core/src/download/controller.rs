//! Download controller: owns every single-stream download of the process.

use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::config::{clamp_segment_concurrency, HlsdmConfig};
use crate::fetch::{CurlTransport, SegmentTransport};
use crate::ids::DownloadId;
use crate::merge::{FileMergeSink, MergeSink};
use crate::playlist::{HttpPlaylistSource, PlaylistError, PlaylistSource};
use crate::registry::Registry;

use super::entry::DownloadEntry;
use super::progress::DownloadProgress;
use super::run::run_download;
use super::types::{Download, Failure};

/// Title used when neither the caller nor the playlist supplies one.
pub const UNKNOWN_TITLE: &str = "Unknown";

const EVENT_CAPACITY: usize = 1024;

/// Why `start` refused a download. Nothing was fetched in either case.
#[derive(Debug, thiserror::Error)]
pub enum StartError {
    #[error(transparent)]
    Playlist(#[from] PlaylistError),
    #[error("playlist task failed: {0}")]
    Task(String),
}

/// External collaborators a controller drives.
pub struct Collaborators {
    pub playlists: Arc<dyn PlaylistSource>,
    pub transport: Arc<dyn SegmentTransport>,
    pub sink: Arc<dyn MergeSink>,
    /// Extension of merged artifacts, without the dot.
    pub output_extension: String,
}

impl Collaborators {
    /// curl playlist source and transport, merged files written to `output_dir`.
    pub fn http(cfg: &HlsdmConfig, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            playlists: Arc::new(HttpPlaylistSource::new(cfg.http.clone())),
            transport: Arc::new(CurlTransport::new(cfg.http.clone())),
            sink: Arc::new(FileMergeSink::new(output_dir)),
            output_extension: cfg.output_extension.clone(),
        }
    }
}

pub(super) struct Shared {
    playlists: Arc<dyn PlaylistSource>,
    pub(super) transport: Arc<dyn SegmentTransport>,
    pub(super) sink: Arc<dyn MergeSink>,
    pub(super) output_extension: String,
    downloads: Registry<DownloadId, DownloadEntry>,
    events: broadcast::Sender<DownloadProgress>,
}

impl Shared {
    /// Broadcast the entry's current progress. No subscribers is fine.
    pub(super) fn publish(&self, entry: &DownloadEntry) {
        let _ = self.events.send(entry.progress());
    }
}

/// Starts, tracks, and cancels downloads. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct DownloadController {
    shared: Arc<Shared>,
}

impl DownloadController {
    pub fn new(c: Collaborators) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                playlists: c.playlists,
                transport: c.transport,
                sink: c.sink,
                output_extension: c.output_extension,
                downloads: Registry::new(),
                events,
            }),
        }
    }

    pub fn from_config(cfg: &HlsdmConfig, output_dir: impl Into<PathBuf>) -> Self {
        Self::new(Collaborators::http(cfg, output_dir))
    }

    /// Resolve the playlist and register a pending download; segment work runs in the background.
    ///
    /// `concurrency` is clamped to 1–8. Fails only if the playlist cannot be resolved or is empty.
    pub async fn start(
        &self,
        url: &str,
        title: Option<&str>,
        concurrency: usize,
    ) -> Result<DownloadId, StartError> {
        let playlists = Arc::clone(&self.shared.playlists);
        let target = url.to_string();
        let playlist = tokio::task::spawn_blocking(move || playlists.resolve(&target))
            .await
            .map_err(|e| StartError::Task(e.to_string()))??;
        if playlist.segments.is_empty() {
            return Err(PlaylistError::Empty.into());
        }

        let title = title
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .or_else(|| playlist.title.clone())
            .unwrap_or_else(|| UNKNOWN_TITLE.to_string());
        let total = playlist.segments.len();
        let (id, entry) = self
            .shared
            .downloads
            .insert_with(|id| DownloadEntry::new(Download::pending(id, url, &title, total)));
        tracing::info!(%id, url, title = %title, segments = total, "download created");
        self.shared.publish(&entry);

        tokio::spawn(run_download(
            Arc::clone(&self.shared),
            id,
            entry,
            playlist.segments,
            clamp_segment_concurrency(concurrency),
        ));
        Ok(id)
    }

    /// Raise the download's cancellation signal and mark it failed ("Download cancelled").
    ///
    /// False if the id is unknown or the download already ended.
    pub fn cancel(&self, id: DownloadId) -> bool {
        let Some(entry) = self.shared.downloads.get(&id) else {
            return false;
        };
        if entry.snapshot().status.is_terminal() {
            return false;
        }
        entry.cancel.cancel();
        if !entry.fail(Failure::cancelled()) {
            return false;
        }
        tracing::info!(%id, bytes = entry.bytes_so_far(), "download cancelled");
        self.shared.publish(&entry);
        true
    }

    pub fn snapshot(&self, id: DownloadId) -> Option<Download> {
        self.shared.downloads.get(&id).map(|e| e.snapshot())
    }

    /// Progress view recomputed now (speed and ETA from current totals).
    pub fn progress(&self, id: DownloadId) -> Option<DownloadProgress> {
        self.shared.downloads.get(&id).map(|e| e.progress())
    }

    /// Bytes accumulated so far (frozen once the download ends).
    pub fn bytes_downloaded(&self, id: DownloadId) -> Option<u64> {
        self.shared.downloads.get(&id).map(|e| e.bytes_so_far())
    }

    /// Snapshots of all known downloads, oldest first.
    pub fn list(&self) -> Vec<Download> {
        self.shared
            .downloads
            .entries()
            .into_iter()
            .map(|(_, e)| e.snapshot())
            .collect()
    }

    /// Attach an observer; every state change of every download is delivered.
    pub fn subscribe(&self) -> broadcast::Receiver<DownloadProgress> {
        self.shared.events.subscribe()
    }

    /// Resolve with the terminal snapshot. None if the id is unknown.
    pub async fn wait(&self, id: DownloadId) -> Option<Download> {
        let entry = self.shared.downloads.get(&id)?;
        entry.finished().await;
        Some(entry.snapshot())
    }

    /// Forget a terminal download. False if unknown or still active.
    pub fn remove(&self, id: DownloadId) -> bool {
        self.shared
            .downloads
            .remove_if(&id, |e| e.snapshot().status.is_terminal())
            .is_some()
    }
}
