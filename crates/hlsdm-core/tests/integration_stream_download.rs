//! Integration tests: local HTTP server, real curl transport, file merge.
//!
//! A playlist and its segments are served over HTTP; downloads run through
//! the controller and queue scheduler and the merged files are checked on disk.

mod common;

use common::hls_server::{self, Routes};
use hlsdm_core::config::HlsdmConfig;
use hlsdm_core::download::{DownloadController, DownloadStatus, FailureKind};
use hlsdm_core::history::{HistoryDb, HistoryEntry};
use hlsdm_core::queue::{QueueScheduler, QueueStatus};
use tempfile::tempdir;

fn segment(i: u8, len: usize) -> Vec<u8> {
    (0..len).map(|k| i.wrapping_mul(31).wrapping_add(k as u8)).collect()
}

fn fast_retry_config() -> HlsdmConfig {
    HlsdmConfig {
        retry_delay_ms: 20,
        ..HlsdmConfig::default()
    }
}

#[tokio::test]
async fn stream_downloads_and_merges_in_playlist_order() {
    let parts: Vec<(String, Vec<u8>)> = (0u8..6)
        .map(|i| (format!("seg{}.ts", i), segment(i, 4096 + i as usize * 100)))
        .collect();
    let refs: Vec<(&str, Vec<u8>)> = parts.iter().map(|(n, b)| (n.as_str(), b.clone())).collect();
    let base = hls_server::start(Routes::new().stream("/show", &refs));

    let out = tempdir().unwrap();
    let cfg = HlsdmConfig::default();
    let controller = DownloadController::from_config(&cfg, out.path());
    let id = controller
        .start(&format!("{}/show/index.m3u8", base), Some("My Show/Pilot"), 3)
        .await
        .expect("start");

    let done = controller.wait(id).await.expect("download exists");
    assert_eq!(done.status, DownloadStatus::Completed, "{:?}", done.failure);
    assert_eq!(done.progress, 100);
    assert_eq!(done.downloaded_segments, 6);

    let expected: Vec<u8> = parts.iter().flat_map(|(_, b)| b.clone()).collect();
    let path = done.file_ref.clone().expect("file ref");
    assert!(path.ends_with(".mp4"), "unexpected name {}", path);
    let name = std::path::Path::new(&path).file_name().unwrap().to_string_lossy().into_owned();
    assert_eq!(name, "My_Show_Pilot.mp4");
    let content = std::fs::read(&path).unwrap();
    assert_eq!(content.len(), expected.len());
    assert_eq!(content, expected, "segments must be merged in playlist order");
    assert_eq!(done.file_size, Some(expected.len() as u64));

    let leftovers: Vec<_> = std::fs::read_dir(out.path())
        .unwrap()
        .flatten()
        .filter(|e| e.file_name().to_string_lossy().ends_with(".part"))
        .collect();
    assert!(leftovers.is_empty(), "temp file must be renamed away");
}

#[tokio::test]
async fn missing_segment_fails_download_without_output() {
    let base = hls_server::start(
        Routes::new()
            .add("/broken/index.m3u8", "#EXTM3U\n#EXTINF:4,\na.ts\n#EXTINF:4,\nmissing.ts\n#EXT-X-ENDLIST\n")
            .add("/broken/a.ts", segment(1, 512)),
    );
    let out = tempdir().unwrap();
    let controller = DownloadController::from_config(&HlsdmConfig::default(), out.path());
    let id = controller
        .start(&format!("{}/broken/index.m3u8", base), None, 2)
        .await
        .expect("playlist resolves");

    let done = controller.wait(id).await.unwrap();
    assert_eq!(done.status, DownloadStatus::Failed);
    let failure = done.failure.expect("failure recorded");
    assert_eq!(failure.kind, FailureKind::Segment);
    assert!(failure.message.contains("Failed to download segment 1"), "{}", failure.message);
    assert!(done.file_ref.is_none());
    assert_eq!(std::fs::read_dir(out.path()).map(|d| d.count()).unwrap_or(0), 0);
}

#[tokio::test]
async fn unreachable_playlist_is_rejected_at_start() {
    let base = hls_server::start(Routes::new());
    let out = tempdir().unwrap();
    let controller = DownloadController::from_config(&HlsdmConfig::default(), out.path());
    let err = controller
        .start(&format!("{}/nothing/index.m3u8", base), None, 2)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("404"), "{}", err);
    assert!(controller.list().is_empty());
}

#[tokio::test]
async fn queue_downloads_good_items_and_retries_missing_one() {
    let base = hls_server::start(
        Routes::new()
            .stream("/a", &[("0.ts", segment(1, 1000)), ("1.ts", segment(2, 1000))])
            .stream("/b", &[("0.ts", segment(3, 2000))]),
    );
    let out = tempdir().unwrap();
    let cfg = fast_retry_config();
    let controller = DownloadController::from_config(&cfg, out.path());
    let scheduler = QueueScheduler::from_config(controller.clone(), &cfg);

    let urls = vec![
        format!("{}/a/index.m3u8", base),
        format!("{}/gone/index.m3u8", base),
        format!("{}/b/index.m3u8", base),
    ];
    let titles = vec!["Alpha".to_string(), String::new(), "Bravo".to_string()];
    let id = scheduler.submit_batch(&urls, &titles, 2, Some("nightly")).unwrap();

    let queue = scheduler.wait(id).await.expect("queue exists");
    assert_eq!(queue.status, QueueStatus::Completed);
    assert_eq!(queue.completed_items, 2);
    assert_eq!(queue.failed_items, 1);

    let missing = &queue.items[1];
    assert_eq!(missing.title, "Video 2");
    assert_eq!(missing.status, DownloadStatus::Failed);
    assert_eq!(missing.retry_count, cfg.max_retries);

    for item in [&queue.items[0], &queue.items[2]] {
        assert_eq!(item.status, DownloadStatus::Completed);
        let path = item.file_ref.as_deref().expect("merged file");
        assert!(std::path::Path::new(path).exists());
    }
    let bravo = std::fs::read(queue.items[2].file_ref.as_deref().unwrap()).unwrap();
    assert_eq!(bravo, segment(3, 2000));

    let progress = scheduler.progress(id).unwrap();
    assert_eq!(progress.overall_progress, 100);
    assert_eq!(progress.active_items, 0);
}

#[tokio::test]
async fn finished_download_lands_in_history() {
    let base = hls_server::start(Routes::new().stream("/h", &[("0.ts", segment(9, 300))]));
    let out = tempdir().unwrap();
    let state = tempdir().unwrap();
    let db = HistoryDb::open_at(&state.path().join("history.db")).await.unwrap();

    let controller = DownloadController::from_config(&HlsdmConfig::default(), out.path());
    let id = controller
        .start(&format!("{}/h/index.m3u8", base), Some("Clip"), 1)
        .await
        .unwrap();
    let done = controller.wait(id).await.unwrap();
    let entry = HistoryEntry::from_download(&done, 0.0);
    db.save(&entry, 100).await.unwrap();

    let listed = db.list().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].title, "Clip");
    assert_eq!(listed[0].status, DownloadStatus::Completed);
    assert_eq!(listed[0].file_size, Some(300));
    assert_eq!(db.stats().await.unwrap().total_size, 300);
}
