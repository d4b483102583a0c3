//! Merge sink: concatenates ordered segment buffers into one artifact.
//!
//! `FileMergeSink` writes a `.part` temp file next to the final path, syncs
//! it, and renames it into place so a partially merged file never appears
//! under the final name.

mod file;

pub use file::{temp_path, FileMergeSink};

use anyhow::Result;
use std::sync::Mutex;

/// Handle to a merged artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedArtifact {
    /// Where the artifact lives (a filesystem path for the file sink).
    pub location: String,
    /// Sum of all segment lengths.
    pub total_bytes: u64,
}

/// Receives segment buffers in original index order. Blocking.
pub trait MergeSink: Send + Sync {
    fn merge(&self, segments: &[Vec<u8>], suggested_name: &str) -> Result<MergedArtifact>;
}

/// Keeps merged artifacts in memory, keyed by location. Handy for embedding and tests.
#[derive(Debug, Default)]
pub struct MemoryMergeSink {
    artifacts: Mutex<Vec<(String, Vec<u8>)>>,
}

impl MemoryMergeSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes of the artifact stored at `location`, if any.
    pub fn get(&self, location: &str) -> Option<Vec<u8>> {
        self.artifacts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .find(|(l, _)| l == location)
            .map(|(_, b)| b.clone())
    }

    pub fn len(&self) -> usize {
        self.artifacts.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl MergeSink for MemoryMergeSink {
    fn merge(&self, segments: &[Vec<u8>], suggested_name: &str) -> Result<MergedArtifact> {
        let total: usize = segments.iter().map(Vec::len).sum();
        let mut merged = Vec::with_capacity(total);
        for s in segments {
            merged.extend_from_slice(s);
        }
        let mut artifacts = self.artifacts.lock().unwrap_or_else(|e| e.into_inner());
        let location = format!("memory://{}/{}", artifacts.len(), suggested_name);
        artifacts.push((location.clone(), merged));
        Ok(MergedArtifact {
            location,
            total_bytes: total as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_sink_concatenates_in_given_order() {
        let sink = MemoryMergeSink::new();
        let art = sink
            .merge(&[b"one".to_vec(), b"-".to_vec(), b"two".to_vec()], "x.mp4")
            .unwrap();
        assert_eq!(art.total_bytes, 7);
        assert_eq!(sink.get(&art.location).unwrap(), b"one-two");
        assert_eq!(sink.len(), 1);
    }
}
