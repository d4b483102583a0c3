//! Scripted collaborators shared by the controller and queue tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::cancel::CancelToken;
use crate::fetch::{FetchError, SegmentTransport};
use crate::merge::MemoryMergeSink;
use crate::playlist::{Playlist, PlaylistError, PlaylistSource};
use crate::download::{Collaborators, DownloadController};

/// Playlists keyed by URL. Unknown URLs are unreachable.
#[derive(Default)]
pub(crate) struct ScriptedPlaylists {
    lists: Mutex<HashMap<String, Vec<String>>>,
    /// Remaining forced failures per URL before it starts resolving.
    flaky: Mutex<HashMap<String, usize>>,
    pub(crate) resolves: AtomicUsize,
}

impl ScriptedPlaylists {
    /// Register `url` with segments `<url>/seg<i>.ts` for i in 0..count.
    pub(crate) fn add(&self, url: &str, count: usize) -> Vec<String> {
        let segs: Vec<String> = (0..count).map(|i| format!("{}/seg{}.ts", url, i)).collect();
        self.lists.lock().unwrap().insert(url.to_string(), segs.clone());
        segs
    }

    /// `url` fails to resolve the next `times` attempts.
    pub(crate) fn fail_first(&self, url: &str, times: usize) {
        self.flaky.lock().unwrap().insert(url.to_string(), times);
    }
}

impl PlaylistSource for ScriptedPlaylists {
    fn resolve(&self, url: &str) -> Result<Playlist, PlaylistError> {
        self.resolves.fetch_add(1, Ordering::SeqCst);
        if let Some(left) = self.flaky.lock().unwrap().get_mut(url) {
            if *left > 0 {
                *left -= 1;
                return Err(PlaylistError::Http(503));
            }
        }
        let segments = self
            .lists
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| PlaylistError::Unreachable(format!("no route to {}", url)))?;
        if segments.is_empty() {
            return Err(PlaylistError::Empty);
        }
        Ok(Playlist {
            url: url.to_string(),
            segments,
            title: Some("scripted".to_string()),
            duration_secs: None,
        })
    }
}

/// Transport answering every segment URL with its own bytes after a per-URL delay.
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    delays: Mutex<HashMap<String, Duration>>,
    failing: Mutex<HashMap<String, u32>>,
    default_delay: Mutex<Duration>,
    in_flight: AtomicUsize,
    pub(crate) peak: AtomicUsize,
    pub(crate) calls: AtomicUsize,
}

impl ScriptedTransport {
    pub(crate) fn delay(&self, url: &str, d: Duration) {
        self.delays.lock().unwrap().insert(url.to_string(), d);
    }

    pub(crate) fn default_delay(&self, d: Duration) {
        *self.default_delay.lock().unwrap() = d;
    }

    pub(crate) fn fail(&self, url: &str, status: u32) {
        self.failing.lock().unwrap().insert(url.to_string(), status);
    }

    pub(crate) fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

impl SegmentTransport for ScriptedTransport {
    fn fetch(&self, url: &str, cancel: &CancelToken) -> Result<Vec<u8>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        let delay = self
            .delays
            .lock()
            .unwrap()
            .get(url)
            .copied()
            .unwrap_or(*self.default_delay.lock().unwrap());
        let deadline = Instant::now() + delay;
        let mut result = Ok(url.as_bytes().to_vec());
        while Instant::now() < deadline {
            if cancel.is_cancelled() {
                result = Err(FetchError::Cancelled);
                break;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        if result.is_ok() {
            if let Some(status) = self.failing.lock().unwrap().get(url) {
                result = Err(FetchError::Http(*status));
            }
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

pub(crate) struct Harness {
    pub(crate) playlists: Arc<ScriptedPlaylists>,
    pub(crate) transport: Arc<ScriptedTransport>,
    pub(crate) sink: Arc<MemoryMergeSink>,
    pub(crate) controller: DownloadController,
}

pub(crate) fn harness() -> Harness {
    let playlists = Arc::new(ScriptedPlaylists::default());
    let transport = Arc::new(ScriptedTransport::default());
    let sink = Arc::new(MemoryMergeSink::new());
    let controller = DownloadController::new(Collaborators {
        playlists: playlists.clone(),
        transport: transport.clone(),
        sink: sink.clone(),
        output_extension: "mp4".to_string(),
    });
    Harness {
        playlists,
        transport,
        sink,
        controller,
    }
}
