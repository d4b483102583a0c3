//! Segment dispatch, progress accounting, and merge for one download.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::task::JoinSet;

use crate::fetch::{fetch_segment, FetchContext, SegmentOutcome};
use crate::gate::Gate;
use crate::ids::DownloadId;
use crate::naming;

use super::controller::Shared;
use super::entry::DownloadEntry;
use super::types::{Failure, FailureKind};

/// Fetch every segment under a gate of `concurrency` permits, then merge in index order.
///
/// All fetches are dispatched up front; the gate bounds how many run. The
/// first failure raises `halted` so queued fetches never start. Fetches
/// already in flight still settle and their bytes are dropped.
pub(super) async fn run_download(
    shared: Arc<Shared>,
    id: DownloadId,
    entry: Arc<DownloadEntry>,
    segments: Vec<String>,
    concurrency: usize,
) {
    if !entry.begin() {
        tracing::debug!(%id, "download ended before segment fetch began");
        return;
    }
    let total = segments.len();
    tracing::info!(%id, segments = total, concurrency, "download started");
    shared.publish(&entry);

    // Ordered slot per segment; filled out of order, read in order.
    let slots: Arc<Mutex<Vec<Option<Vec<u8>>>>> = Arc::new(Mutex::new(vec![None; total]));
    let ctx = FetchContext {
        transport: Arc::clone(&shared.transport),
        gate: Gate::new(concurrency),
        cancel: entry.cancel.clone(),
        halted: Arc::new(AtomicBool::new(false)),
    };

    let mut set = JoinSet::new();
    for (index, url) in segments.into_iter().enumerate() {
        let ctx = ctx.clone();
        let entry = Arc::clone(&entry);
        let shared = Arc::clone(&shared);
        let slots = Arc::clone(&slots);
        set.spawn(async move {
            match fetch_segment(&ctx, index, url).await {
                SegmentOutcome::Fetched(bytes) => {
                    let len = bytes.len() as u64;
                    let accepted = entry.record_segment(len, || {
                        slots.lock().unwrap_or_else(|e| e.into_inner())[index] = Some(bytes);
                    });
                    if accepted {
                        tracing::debug!(%id, index, bytes = len, "segment done");
                        shared.publish(&entry);
                    }
                }
                SegmentOutcome::Failed(e) => {
                    // `halted` is already raised; only the first failure reaches the record.
                    let failure = Failure::new(
                        FailureKind::Segment,
                        format!("Failed to download segment {}: {}", index, e),
                    );
                    if entry.fail(failure) {
                        tracing::warn!(%id, index, "segment failed: {}", e);
                        shared.publish(&entry);
                    }
                }
                SegmentOutcome::Skipped | SegmentOutcome::Cancelled => {}
            }
        });
    }

    while let Some(joined) = set.join_next().await {
        if let Err(e) = joined {
            ctx.halted.store(true, Ordering::Release);
            if entry.fail(Failure::new(FailureKind::Segment, format!("segment task: {}", e))) {
                shared.publish(&entry);
            }
        }
    }

    if ctx.cancel.is_cancelled() || ctx.halted.load(Ordering::Acquire) {
        tracing::debug!(%id, "download stopped; discarding fetched segments");
        return;
    }

    let buffers: Option<Vec<Vec<u8>>> = std::mem::take(&mut *slots.lock().unwrap_or_else(|e| e.into_inner()))
        .into_iter()
        .collect();
    let Some(buffers) = buffers else {
        if entry.fail(Failure::new(FailureKind::Merge, "missing segment data at merge time")) {
            shared.publish(&entry);
        }
        return;
    };

    let name = naming::output_file_name(&entry.snapshot().title, &shared.output_extension);
    let sink = Arc::clone(&shared.sink);
    let merged = tokio::task::spawn_blocking(move || sink.merge(&buffers, &name)).await;

    match merged {
        Ok(Ok(artifact)) => {
            if entry.complete(&artifact) {
                tracing::info!(%id, location = %artifact.location, bytes = artifact.total_bytes, "download completed");
                shared.publish(&entry);
            } else {
                tracing::debug!(%id, location = %artifact.location, "merged after cancel; result not recorded");
            }
        }
        Ok(Err(e)) => {
            let failure = Failure::new(FailureKind::Merge, format!("Failed to merge segments: {:#}", e));
            if entry.fail(failure) {
                tracing::warn!(%id, "merge failed: {:#}", e);
                shared.publish(&entry);
            }
        }
        Err(join) => {
            if entry.fail(Failure::new(FailureKind::Merge, format!("merge task: {}", join))) {
                shared.publish(&entry);
            }
        }
    }
}
