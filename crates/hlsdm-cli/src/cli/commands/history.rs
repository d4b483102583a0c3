//! `hlsdm history ...` – list, search, and maintain the download history.

use anyhow::{bail, Context, Result};
use hlsdm_core::config::HlsdmConfig;
use hlsdm_core::download::DownloadStatus;
use hlsdm_core::history::{HistoryDb, HistoryEntry};

use crate::cli::HistoryAction;

fn print_entries(entries: &[HistoryEntry]) {
    if entries.is_empty() {
        println!("No history entries.");
        return;
    }
    println!("{:<16} {:<11} {:>4} {:>12} {}", "ID", "STATUS", "%", "SIZE", "TITLE");
    for e in entries {
        let size = e
            .file_size
            .map(|s| s.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<16} {:<11} {:>4} {:>12} {}",
            e.id,
            e.status.as_str(),
            e.progress,
            size,
            e.title
        );
        if let Some(msg) = &e.error_message {
            println!("{:<16} {}", "", msg);
        }
    }
}

pub async fn run_history(cfg: &HlsdmConfig, db: &HistoryDb, action: HistoryAction) -> Result<()> {
    match action {
        HistoryAction::List { status: None } => print_entries(&db.list().await?),
        HistoryAction::List { status: Some(s) } => {
            let Some(status) = DownloadStatus::from_str(&s) else {
                bail!("unknown status {:?} (pending, downloading, completed, failed)", s);
            };
            print_entries(&db.by_status(status).await?);
        }
        HistoryAction::Search { query } => print_entries(&db.search(&query).await?),
        HistoryAction::Stats => {
            let s = db.stats().await?;
            println!("Downloads: {}", s.total_downloads);
            println!("Completed: {}", s.completed_downloads);
            println!("Failed:    {}", s.failed_downloads);
            println!("Size:      {} bytes", s.total_size);
        }
        HistoryAction::Export { path } => {
            let json = db.export_json().await?;
            match path {
                Some(p) => {
                    tokio::fs::write(&p, json)
                        .await
                        .with_context(|| format!("write {}", p.display()))?;
                    println!("Exported history to {}", p.display());
                }
                None => println!("{}", json),
            }
        }
        HistoryAction::Import { path } => {
            let json = tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("read {}", path.display()))?;
            let n = db.import_json(&json, cfg.history_limit).await?;
            println!("Imported {} entries", n);
        }
        HistoryAction::Remove { id } => {
            if !db.remove(&id).await? {
                bail!("no history entry {}", id);
            }
            println!("Removed {}", id);
        }
        HistoryAction::Clear => {
            let n = db.clear().await?;
            println!("Cleared {} entries", n);
        }
    }
    Ok(())
}
