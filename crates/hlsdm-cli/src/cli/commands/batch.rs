//! `hlsdm batch <url>...` – download several streams as one queue.

use anyhow::{bail, Context, Result};
use hlsdm_core::config::HlsdmConfig;
use hlsdm_core::control::default_control_socket_path;
use hlsdm_core::download::{Download, DownloadController, DownloadProgress, DownloadStatus};
use hlsdm_core::ids::DownloadId;
use hlsdm_core::history::{HistoryDb, HistoryEntry};
use hlsdm_core::queue::{QueueScheduler, QueueStatus};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::sync::broadcast::error::{RecvError, TryRecvError};

use crate::cli::control_socket;
use crate::cli::progress::queue_line;

const PROGRESS_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Default)]
pub struct BatchArgs {
    pub urls: Vec<String>,
    pub file: Option<PathBuf>,
    pub titles: Vec<String>,
    pub jobs: Option<usize>,
    pub name: Option<String>,
    pub output_dir: Option<PathBuf>,
}

/// URLs from a list file: one per line, blank lines and `#` comments skipped.
pub fn read_url_file(path: &Path) -> Result<Vec<String>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read URL list {}", path.display()))?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_string)
        .collect())
}

/// Last reported speed of each download, recorded with its history entry.
#[derive(Debug, Default)]
struct SpeedLog(HashMap<DownloadId, f64>);

impl SpeedLog {
    fn record(&mut self, ev: &DownloadProgress) {
        self.0.insert(ev.download_id, ev.download_speed);
    }

    fn history_entry(&self, d: &Download) -> HistoryEntry {
        HistoryEntry::from_download(d, self.0.get(&d.id).copied().unwrap_or(0.0))
    }
}

pub async fn run_batch(cfg: &HlsdmConfig, db: &HistoryDb, args: BatchArgs) -> Result<()> {
    let mut urls = args.urls;
    if let Some(path) = &args.file {
        urls.extend(read_url_file(path)?);
    }

    let dir = super::output_dir(cfg, args.output_dir)?;
    let controller = DownloadController::from_config(cfg, &dir);
    let scheduler = QueueScheduler::from_config(controller.clone(), cfg);

    let socket_path = default_control_socket_path().ok();
    if let Some(path) = &socket_path {
        match control_socket::spawn_control_listener(scheduler.clone(), path) {
            Ok(_) => tracing::debug!(path = %path.display(), "control socket listening"),
            Err(e) => tracing::warn!("control socket unavailable: {:#}", e),
        }
    }

    let mut events = scheduler.subscribe();
    let mut download_events = controller.subscribe();
    let mut speeds = SpeedLog::default();
    let id = scheduler.submit_batch(
        &urls,
        &args.titles,
        args.jobs.unwrap_or(cfg.queue_max_concurrent),
        args.name.as_deref(),
    )?;
    if let Some(q) = scheduler.snapshot(id) {
        println!(
            "Queue {} \"{}\": {} item(s), {} at a time (pause/resume/cancel with `hlsdm pause {}`)",
            id, q.name, q.total_items, q.max_concurrent, id
        );
    }

    let mut last_print: Option<Instant> = None;
    loop {
        tokio::select! {
            ev = events.recv() => match ev {
                Ok(p) if p.queue_id == id => {
                    let due = last_print.map_or(true, |t| t.elapsed() >= PROGRESS_INTERVAL);
                    if due || p.status.is_terminal() || p.status == QueueStatus::Paused {
                        print!("\r{}", queue_line(&p));
                        let _ = std::io::stdout().flush();
                        last_print = Some(Instant::now());
                    }
                    if p.status.is_terminal() {
                        break;
                    }
                }
                Ok(_) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break,
            },
            ev = download_events.recv() => {
                if let Ok(ev) = ev {
                    speeds.record(&ev);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                if scheduler.cancel(id).is_ok() {
                    tracing::info!(queue = %id, "cancelled by Ctrl-C");
                }
            }
        }
    }
    println!();

    let queue = scheduler.wait(id).await.context("queue record missing")?;
    loop {
        match download_events.try_recv() {
            Ok(ev) => speeds.record(&ev),
            Err(TryRecvError::Lagged(_)) => continue,
            Err(_) => break,
        }
    }
    if let Some(path) = &socket_path {
        let _ = std::fs::remove_file(path);
    }

    for item in &queue.items {
        let download = item.download_id.and_then(|d| controller.snapshot(d));
        if let Some(d) = &download {
            if let Err(e) = db.save(&speeds.history_entry(d), cfg.history_limit).await {
                tracing::warn!("could not record history: {:#}", e);
            }
        }
        let outcome = match item.status {
            DownloadStatus::Completed => item.file_ref.clone().unwrap_or_default(),
            _ => item
                .failure
                .as_ref()
                .map(|f| f.message.clone())
                .unwrap_or_else(|| item.status.as_str().to_string()),
        };
        println!(
            "  [{}] {} ({} retries): {}",
            item.status.as_str(),
            item.title,
            item.retry_count,
            outcome
        );
    }
    println!(
        "Queue {} {}: {} completed, {} failed",
        id, queue.status, queue.completed_items, queue.failed_items
    );

    if queue.status == QueueStatus::Failed {
        bail!("queue {} failed", id);
    }
    Ok(())
}
