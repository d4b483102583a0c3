//! Output filename derivation.
//!
//! Turns a download title into a safe local filename and avoids clobbering
//! files that already exist in the output directory.

mod sanitize;

pub use sanitize::sanitize_filename;

use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};

/// Stem used when a title sanitizes to nothing.
const DEFAULT_STEM: &str = "video";

/// `<sanitized title>.<extension>` (extension without leading dot; empty = none).
pub fn output_file_name(title: &str, extension: &str) -> String {
    let stem = sanitize_filename(title);
    let stem = if stem.is_empty() { DEFAULT_STEM } else { stem.as_str() };
    let ext = extension.trim_start_matches('.');
    if ext.is_empty() {
        stem.to_string()
    } else {
        format!("{}.{}", stem, ext)
    }
}

/// Claim the first free name among `name`, `stem-1.ext`, `stem-2.ext`, … in `dir`.
///
/// The claim is an empty file created with `create_new`, so two callers can
/// never be handed the same path. The caller owns the file and replaces or
/// removes it.
pub fn reserve_path(dir: &Path, name: &str) -> io::Result<PathBuf> {
    let (stem, ext) = match name.rfind('.') {
        Some(i) if i > 0 => (&name[..i], &name[i..]),
        _ => (name, ""),
    };
    let mut n = 0u32;
    loop {
        let candidate = if n == 0 {
            dir.join(name)
        } else {
            dir.join(format!("{}-{}{}", stem, n, ext))
        };
        match OpenOptions::new().write(true).create_new(true).open(&candidate) {
            Ok(_) => return Ok(candidate),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => n += 1,
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_name_from_title() {
        assert_eq!(output_file_name("My Show: Episode 1", "mp4"), "My_Show:_Episode_1.mp4");
        assert_eq!(output_file_name("clip", ".ts"), "clip.ts");
        assert_eq!(output_file_name("  ..  ", "mp4"), "video.mp4");
        assert_eq!(output_file_name("raw", ""), "raw");
    }

    #[test]
    fn reserve_path_skips_taken_names() {
        let dir = tempfile::tempdir().unwrap();
        let first = reserve_path(dir.path(), "a.mp4").unwrap();
        assert_eq!(first, dir.path().join("a.mp4"));
        assert!(first.exists());
        let second = reserve_path(dir.path(), "a.mp4").unwrap();
        assert_eq!(second, dir.path().join("a-1.mp4"));
        assert_eq!(reserve_path(dir.path(), "a.mp4").unwrap(), dir.path().join("a-2.mp4"));
        assert_eq!(reserve_path(dir.path(), "raw").unwrap(), dir.path().join("raw"));
        assert_eq!(reserve_path(dir.path(), "raw").unwrap(), dir.path().join("raw-1"));
    }

    #[test]
    fn concurrent_reservations_never_collide() {
        let dir = tempfile::tempdir().unwrap();
        let claimed: Vec<PathBuf> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| s.spawn(|| reserve_path(dir.path(), "index.mp4").unwrap()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        let mut unique = claimed.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), 8);
    }
}
