//! `hlsdm get <url>` – download one stream with a live progress line.

use anyhow::{bail, Context, Result};
use hlsdm_core::config::HlsdmConfig;
use hlsdm_core::download::{DownloadController, DownloadStatus};
use hlsdm_core::history::{HistoryDb, HistoryEntry};
use std::io::Write;
use std::path::PathBuf;
use tokio::sync::broadcast::error::RecvError;

use crate::cli::progress::download_line;

pub async fn run_get(
    cfg: &HlsdmConfig,
    db: &HistoryDb,
    url: &str,
    title: Option<&str>,
    concurrency: Option<usize>,
    output_dir: Option<PathBuf>,
) -> Result<()> {
    let dir = super::output_dir(cfg, output_dir)?;
    let controller = DownloadController::from_config(cfg, &dir);
    let mut events = controller.subscribe();

    let id = controller
        .start(url, title, concurrency.unwrap_or(cfg.segment_concurrency))
        .await
        .with_context(|| format!("cannot download {}", url))?;
    if let Some(d) = controller.snapshot(id) {
        println!("{}: \"{}\", {} segments", id, d.title, d.total_segments);
    }

    let mut speed = 0.0;
    loop {
        tokio::select! {
            ev = events.recv() => match ev {
                Ok(ev) if ev.download_id == id => {
                    speed = ev.download_speed;
                    print!("\r{}", download_line(&ev));
                    let _ = std::io::stdout().flush();
                    if ev.status.is_terminal() {
                        break;
                    }
                }
                Ok(_) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => {
                if controller.cancel(id) {
                    tracing::info!(%id, "cancelled by Ctrl-C");
                }
            }
        }
    }
    println!();

    let done = controller
        .wait(id)
        .await
        .context("download record missing")?;
    if let Err(e) = db.save(&HistoryEntry::from_download(&done, speed), cfg.history_limit).await {
        tracing::warn!("could not record history: {:#}", e);
    }

    match done.status {
        DownloadStatus::Completed => {
            println!(
                "Saved {} ({} bytes)",
                done.file_ref.as_deref().unwrap_or("-"),
                done.file_size.unwrap_or(0)
            );
            Ok(())
        }
        _ if done.is_cancelled() => {
            println!("Download cancelled");
            Ok(())
        }
        _ => {
            let reason = done
                .failure
                .map(|f| f.message)
                .unwrap_or_else(|| "download failed".to_string());
            bail!(reason)
        }
    }
}
