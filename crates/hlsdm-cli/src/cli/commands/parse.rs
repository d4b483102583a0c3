//! `hlsdm parse <url>` – resolve a playlist and print its segments.

use anyhow::{Context, Result};
use hlsdm_core::config::HlsdmConfig;
use hlsdm_core::playlist::{HttpPlaylistSource, PlaylistSource};

pub async fn run_parse(cfg: &HlsdmConfig, url: &str) -> Result<()> {
    let source = HttpPlaylistSource::new(cfg.http.clone());
    let target = url.to_string();
    let playlist = tokio::task::spawn_blocking(move || source.resolve(&target))
        .await
        .context("playlist task failed")??;

    println!("Title:    {}", playlist.title.as_deref().unwrap_or("-"));
    println!("Segments: {}", playlist.segments.len());
    if let Some(d) = playlist.duration_secs {
        println!("Duration: {:.1}s", d);
    }
    for (i, seg) in playlist.segments.iter().enumerate() {
        println!("{:>5}  {}", i, seg);
    }
    Ok(())
}
