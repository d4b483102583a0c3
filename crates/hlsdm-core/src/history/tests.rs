//! Tests for history (use in-memory DB helper from db).

use crate::download::DownloadStatus;
use crate::history::db::open_memory;
use crate::history::{HistoryDb, HistoryEntry, HistoryStats};

fn entry(id: &str, title: &str, status: DownloadStatus, size: Option<u64>) -> HistoryEntry {
    HistoryEntry {
        id: id.to_string(),
        url: format!("https://cdn.example.com/{}/index.m3u8", id),
        title: title.to_string(),
        status,
        progress: if status == DownloadStatus::Completed { 100 } else { 40 },
        total_segments: 10,
        downloaded_segments: if status == DownloadStatus::Completed { 10 } else { 4 },
        created_at: 1_700_000_000,
        completed_at: None,
        file_ref: None,
        file_size: size,
        download_speed: 0.0,
        error_message: (status == DownloadStatus::Failed).then(|| "Download cancelled".to_string()),
    }
}

#[tokio::test]
async fn save_is_upsert_and_newest_first() {
    let db = open_memory().await.unwrap();
    db.save(&entry("a", "Alpha", DownloadStatus::Completed, Some(10)), 100).await.unwrap();
    db.save(&entry("b", "Beta", DownloadStatus::Failed, None), 100).await.unwrap();

    let ids: Vec<String> = db.list().await.unwrap().into_iter().map(|e| e.id).collect();
    assert_eq!(ids, vec!["b", "a"]);

    // Re-saving "a" replaces it and moves it to the front.
    let mut again = entry("a", "Alpha (again)", DownloadStatus::Completed, Some(12));
    again.download_speed = 2048.5;
    db.save(&again, 100).await.unwrap();
    let all = db.list().await.unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0], again);
    assert_eq!(db.get("b").await.unwrap().unwrap().error_message.as_deref(), Some("Download cancelled"));
}

#[tokio::test]
async fn save_trims_to_limit() {
    let db = open_memory().await.unwrap();
    for n in 0..5 {
        db.save(&entry(&format!("e{}", n), "x", DownloadStatus::Completed, None), 3)
            .await
            .unwrap();
    }
    let ids: Vec<String> = db.list().await.unwrap().into_iter().map(|e| e.id).collect();
    assert_eq!(ids, vec!["e4", "e3", "e2"]);
}

#[tokio::test]
async fn search_and_status_filters() {
    let db = open_memory().await.unwrap();
    db.save(&entry("news", "Evening News", DownloadStatus::Completed, Some(5)), 100).await.unwrap();
    db.save(&entry("match", "Cup Final", DownloadStatus::Failed, None), 100).await.unwrap();

    let hits = db.search("NEWS").await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].title, "Evening News");
    // URL matches too.
    assert_eq!(db.search("/match/").await.unwrap().len(), 1);
    assert!(db.search("nothing").await.unwrap().is_empty());

    let failed = db.by_status(DownloadStatus::Failed).await.unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].id, "match");
}

#[tokio::test]
async fn stats_remove_clear() {
    let db = open_memory().await.unwrap();
    assert_eq!(db.stats().await.unwrap(), HistoryStats::default());

    db.save(&entry("a", "A", DownloadStatus::Completed, Some(100)), 100).await.unwrap();
    db.save(&entry("b", "B", DownloadStatus::Completed, Some(50)), 100).await.unwrap();
    db.save(&entry("c", "C", DownloadStatus::Failed, None), 100).await.unwrap();
    assert_eq!(
        db.stats().await.unwrap(),
        HistoryStats {
            total_downloads: 3,
            completed_downloads: 2,
            failed_downloads: 1,
            total_size: 150,
        }
    );

    assert!(db.remove("b").await.unwrap());
    assert!(!db.remove("b").await.unwrap());
    assert_eq!(db.clear().await.unwrap(), 2);
    assert!(db.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn export_then_import_drops_invalid_items() {
    let db = open_memory().await.unwrap();
    db.save(&entry("a", "A", DownloadStatus::Completed, Some(1)), 100).await.unwrap();
    db.save(&entry("b", "B", DownloadStatus::Completed, Some(2)), 100).await.unwrap();
    let exported = db.export_json().await.unwrap();

    let mut items: Vec<serde_json::Value> = serde_json::from_str(&exported).unwrap();
    items.push(serde_json::json!({ "id": "broken", "url": "https://x" }));
    let json = serde_json::to_string(&items).unwrap();

    let other = open_memory().await.unwrap();
    other.save(&entry("old", "Old", DownloadStatus::Failed, None), 100).await.unwrap();
    assert_eq!(other.import_json(&json, 100).await.unwrap(), 2);
    let ids: Vec<String> = other.list().await.unwrap().into_iter().map(|e| e.id).collect();
    assert_eq!(ids, vec!["b", "a"]);
}

#[tokio::test]
async fn import_rejects_non_array() {
    let db = open_memory().await.unwrap();
    assert!(db.import_json(r#"{"id":"a"}"#, 100).await.is_err());
    assert!(db.import_json("not json", 100).await.is_err());
}

#[tokio::test]
async fn open_at_creates_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("history.db");
    let db = HistoryDb::open_at(&path).await.unwrap();
    db.save(&entry("a", "A", DownloadStatus::Completed, None), 100).await.unwrap();
    drop(db);

    let reopened = HistoryDb::open_at(&path).await.unwrap();
    assert_eq!(reopened.list().await.unwrap().len(), 1);
}
