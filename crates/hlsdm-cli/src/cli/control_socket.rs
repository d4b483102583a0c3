//! Control socket: server (during `hlsdm batch`) and client (for `hlsdm pause|resume|cancel`).
//! Protocol: one command per line ("pause q-1"); the server answers "ok" or "error: <reason>".

use anyhow::{bail, Context, Result};
use hlsdm_core::control::ControlCommand;
use hlsdm_core::queue::QueueScheduler;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};

/// Execute one line against the scheduler and build the reply.
pub fn handle_line(scheduler: &QueueScheduler, line: &str) -> String {
    match line.parse::<ControlCommand>() {
        Ok(cmd) => match cmd.apply(scheduler) {
            Ok(()) => {
                tracing::info!(%cmd, "control command applied");
                "ok".to_string()
            }
            Err(e) => format!("error: {}", e),
        },
        Err(e) => format!("error: {}", e),
    }
}

/// Listens on `path` and applies each received command to `scheduler`.
/// Binding happens before returning so clients can connect right away.
pub fn spawn_control_listener(
    scheduler: QueueScheduler,
    path: impl AsRef<Path>,
) -> Result<tokio::task::JoinHandle<()>> {
    let path: PathBuf = path.as_ref().to_path_buf();
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let _ = std::fs::remove_file(&path);
    let listener = UnixListener::bind(&path)
        .with_context(|| format!("bind control socket {}", path.display()))?;

    let handle = tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((stream, _)) => {
                    let scheduler = scheduler.clone();
                    tokio::spawn(async move {
                        let (read, mut write) = stream.into_split();
                        let mut lines = BufReader::new(read).lines();
                        while let Ok(Some(line)) = lines.next_line().await {
                            if line.trim().is_empty() {
                                continue;
                            }
                            let reply = handle_line(&scheduler, &line);
                            if write.write_all(format!("{}\n", reply).as_bytes()).await.is_err() {
                                break;
                            }
                        }
                    });
                }
                Err(e) => tracing::debug!("control socket accept: {}", e),
            }
        }
    });
    Ok(handle)
}

/// Sends one command and returns the server's reply line.
pub async fn send_command(socket_path: &Path, cmd: ControlCommand) -> Result<String> {
    if !socket_path.exists() {
        bail!(
            "no running batch found (control socket {} does not exist)",
            socket_path.display()
        );
    }
    let stream = UnixStream::connect(socket_path)
        .await
        .with_context(|| format!("connect to {}", socket_path.display()))?;
    let (read, mut write) = stream.into_split();
    write.write_all(format!("{}\n", cmd).as_bytes()).await?;
    let reply = BufReader::new(read)
        .lines()
        .next_line()
        .await?
        .unwrap_or_else(|| "error: no reply".to_string());
    Ok(reply)
}
