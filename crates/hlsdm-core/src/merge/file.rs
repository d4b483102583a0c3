//! File-backed merge sink.

use anyhow::{Context, Result};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::naming;

use super::{MergeSink, MergedArtifact};

/// Temporary file suffix used before atomic rename.
pub const TEMP_SUFFIX: &str = ".part";

/// Path for the temp file: appends `.part` to the final path (e.g. `show.mp4` → `show.mp4.part`).
pub fn temp_path(final_path: &Path) -> PathBuf {
    let mut o = final_path.as_os_str().to_owned();
    o.push(TEMP_SUFFIX);
    PathBuf::from(o)
}

/// Temp file beside a reserved final path. Only the reservation's owner
/// writes here, so a file already present is a leftover from an interrupted run.
fn create_temp(tmp: &Path) -> std::io::Result<File> {
    let open = || OpenOptions::new().write(true).create_new(true).open(tmp);
    match open() {
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
            std::fs::remove_file(tmp)?;
            open()
        }
        other => other,
    }
}

/// Writes merged streams into `dir`, never overwriting an existing file.
#[derive(Debug, Clone)]
pub struct FileMergeSink {
    dir: PathBuf,
}

impl FileMergeSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl MergeSink for FileMergeSink {
    fn merge(&self, segments: &[Vec<u8>], suggested_name: &str) -> Result<MergedArtifact> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("create output dir {}", self.dir.display()))?;
        let final_path = naming::reserve_path(&self.dir, suggested_name)
            .with_context(|| format!("reserve output name {} in {}", suggested_name, self.dir.display()))?;
        let tmp = temp_path(&final_path);

        let file = match create_temp(&tmp) {
            Ok(f) => f,
            Err(e) => {
                let _ = std::fs::remove_file(&final_path);
                return Err(e)
                    .with_context(|| format!("failed to create temp file: {}", tmp.display()));
            }
        };
        let mut writer = BufWriter::new(file);
        let mut total = 0u64;
        let written = segments.iter().try_for_each(|s| {
            total += s.len() as u64;
            writer.write_all(s)
        });
        let finished = written
            .and_then(|_| writer.flush())
            .context("write merged stream")
            .and_then(|_| {
                writer
                    .get_ref()
                    .sync_all()
                    .context("sync merged stream")
            });
        if let Err(e) = finished {
            drop(writer);
            let _ = std::fs::remove_file(&tmp);
            let _ = std::fs::remove_file(&final_path);
            return Err(e);
        }
        drop(writer);

        // Replaces the empty reservation in one step.
        if let Err(e) = std::fs::rename(&tmp, &final_path) {
            let _ = std::fs::remove_file(&tmp);
            let _ = std::fs::remove_file(&final_path);
            return Err(e).with_context(|| {
                format!(
                    "failed to rename {} to {}",
                    tmp.display(),
                    final_path.display()
                )
            });
        }
        tracing::debug!(path = %final_path.display(), bytes = total, "merged stream written");

        Ok(MergedArtifact {
            location: final_path.to_string_lossy().into_owned(),
            total_bytes: total,
        })
    }
}
