//! Queue dispatch: one run admits items under the queue gate; each item
//! drives its own download and retries with a fixed delay.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinSet;

use crate::cancel::CancelToken;
use crate::download::{unix_timestamp, Download, DownloadProgress, DownloadStatus, Failure, FailureKind};
use crate::gate::{Gate, GatePermit};
use crate::ids::{DownloadId, QueueId};
use crate::retry::RetryDecision;

use super::record::QueueRecord;
use super::scheduler::Shared;

/// How one attempt of an item ended.
enum Attempt {
    /// The download reached a terminal state (or never started).
    Ended {
        download: Option<DownloadId>,
        result: Result<Download, Failure>,
    },
    /// The run was stopped while the attempt was starting; nothing to record.
    Abandoned,
}

/// Admit every pending item, in submission order, under a gate of `max_concurrent` permits.
///
/// Returns once every admitted item task has settled. A raised `run` token
/// stops admission; items not yet admitted stay pending for the next run.
pub(super) async fn dispatch(shared: Arc<Shared>, id: QueueId, record: Arc<QueueRecord>, run: CancelToken) {
    let (permits, order) = {
        let st = record.lock();
        let mut pending: Vec<(usize, usize)> = st
            .queue
            .items
            .iter()
            .enumerate()
            .filter(|(_, item)| item.status == DownloadStatus::Pending)
            .map(|(index, item)| (item.priority, index))
            .collect();
        pending.sort_unstable();
        (st.queue.max_concurrent, pending.into_iter().map(|(_, i)| i).collect::<Vec<_>>())
    };
    tracing::debug!(queue = %id, pending = order.len(), permits, "dispatch run started");

    let gate = Gate::new(permits);
    let mut items = JoinSet::new();
    for index in order {
        let Ok(permit) = gate.acquire(&run).await else {
            break;
        };
        {
            let st = record.lock();
            if run.is_cancelled() {
                break;
            }
            if st.queue.items[index].status != DownloadStatus::Pending {
                continue;
            }
        }
        items.spawn(run_item(
            Arc::clone(&shared),
            id,
            Arc::clone(&record),
            index,
            run.clone(),
            gate.clone(),
            permit,
        ));
    }

    while let Some(joined) = items.join_next().await {
        if let Err(e) = joined {
            tracing::error!(queue = %id, "queue item task failed: {}", e);
        }
    }
    tracing::debug!(queue = %id, "dispatch run settled");
}

/// Drive one item until it is terminal, the run stops, or it is handed back as pending.
async fn run_item(
    shared: Arc<Shared>,
    id: QueueId,
    record: Arc<QueueRecord>,
    index: usize,
    run: CancelToken,
    gate: Gate,
    first: GatePermit,
) {
    let mut held = Some(first);
    loop {
        let permit = match held.take() {
            Some(p) => p,
            None => match gate.acquire(&run).await {
                Ok(p) => p,
                Err(_) => return,
            },
        };

        let (url, title) = {
            let mut st = record.lock();
            if run.is_cancelled() {
                return;
            }
            let item = &mut st.queue.items[index];
            if item.status != DownloadStatus::Pending {
                return;
            }
            item.status = DownloadStatus::Downloading;
            (item.url.clone(), item.title.clone())
        };
        shared.publish(&record);

        let (download, result) = match attempt(&shared, &record, index, &run, &url, &title).await {
            Attempt::Ended { download, result } => (download, result),
            Attempt::Abandoned => return,
        };
        let retry = settle(&shared, id, &record, index, &run, download, result);
        if let Some(download) = download {
            forget_if_superseded(&shared, &record, index, download);
        }
        let Some(delay) = retry else {
            return;
        };

        drop(permit);
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = run.cancelled() => return,
        }
    }
}

/// Start the item's download and mirror its progress until it ends.
async fn attempt(
    shared: &Shared,
    record: &QueueRecord,
    index: usize,
    run: &CancelToken,
    url: &str,
    title: &str,
) -> Attempt {
    let controller = &shared.controller;
    let mut events = controller.subscribe();
    let download = match controller.start(url, Some(title), shared.options.item_concurrency).await {
        Ok(d) => d,
        Err(e) => {
            return Attempt::Ended {
                download: None,
                result: Err(Failure::new(FailureKind::Playlist, e.to_string())),
            }
        }
    };

    {
        let mut st = record.lock();
        let item = &mut st.queue.items[index];
        if run.is_cancelled() || item.status != DownloadStatus::Downloading {
            drop(st);
            controller.cancel(download);
            controller.remove(download);
            return Attempt::Abandoned;
        }
        item.download_id = Some(download);
        if let Some(snap) = controller.snapshot(download) {
            item.total_segments = snap.total_segments;
        }
    }
    shared.publish(record);

    let finished = controller.wait(download);
    tokio::pin!(finished);
    let last = loop {
        tokio::select! {
            snap = &mut finished => break snap,
            ev = events.recv() => match ev {
                Ok(ev) if ev.download_id == download => {
                    if mirror(record, index, &ev) {
                        shared.publish(record);
                    }
                }
                Ok(_) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break (&mut finished).await,
            },
        }
    };

    let result = match last {
        Some(d) => Ok(d),
        None => Err(Failure::new(FailureKind::Segment, "download record disappeared")),
    };
    Attempt::Ended {
        download: Some(download),
        result,
    }
}

/// Drop a finished attempt from the controller once the item no longer points at it
/// (retried or reset by pause). The item's current attempt stays until the queue is removed.
fn forget_if_superseded(shared: &Shared, record: &QueueRecord, index: usize, download: DownloadId) {
    let current = record.lock().queue.items[index].download_id;
    if current != Some(download) && shared.controller.remove(download) {
        tracing::debug!(%download, "superseded attempt forgotten");
    }
}

/// Copy a download event into the item that owns it. False if the item moved on.
fn mirror(record: &QueueRecord, index: usize, ev: &DownloadProgress) -> bool {
    let mut st = record.lock();
    let item = &mut st.queue.items[index];
    if item.download_id != Some(ev.download_id) || item.status != DownloadStatus::Downloading {
        return false;
    }
    item.progress = ev.progress;
    item.downloaded_segments = ev.current_segment;
    item.total_segments = ev.total_segments;
    true
}

/// Record an attempt's outcome. Returns the retry delay when the item goes back to pending
/// and this task should re-dispatch it.
fn settle(
    shared: &Shared,
    id: QueueId,
    record: &QueueRecord,
    index: usize,
    run: &CancelToken,
    download: Option<DownloadId>,
    result: Result<Download, Failure>,
) -> Option<Duration> {
    let mut retry_in = None;
    let finished = {
        let mut st = record.lock();
        let item = &st.queue.items[index];
        // Pause reset or cancel already took this item over.
        if item.status != DownloadStatus::Downloading || item.download_id != download {
            return None;
        }
        if download.is_none() && run.is_cancelled() {
            return None;
        }

        let failure = match result {
            Ok(d) if d.status == DownloadStatus::Completed => {
                let item = &mut st.queue.items[index];
                item.status = DownloadStatus::Completed;
                item.progress = 100;
                item.downloaded_segments = d.total_segments;
                item.total_segments = d.total_segments;
                item.completed_at = d.completed_at.or_else(|| Some(unix_timestamp()));
                item.file_size = d.file_size;
                item.file_ref = d.file_ref;
                item.failure = None;
                st.queue.completed_items += 1;
                tracing::info!(queue = %id, item = %st.queue.items[index].id, "queue item completed");
                None
            }
            Ok(d) => Some(
                d.failure
                    .unwrap_or_else(|| Failure::new(FailureKind::Segment, "download failed")),
            ),
            Err(f) => Some(f),
        };

        if let Some(failure) = failure {
            let policy = shared.options.retry;
            let item = &mut st.queue.items[index];
            match policy.decide(item.retry_count, &failure) {
                RetryDecision::RetryAfter(delay) => {
                    item.retry_count += 1;
                    tracing::warn!(
                        queue = %id,
                        item = %item.id,
                        retry = item.retry_count,
                        max = item.max_retries,
                        "queue item failed, retrying: {}",
                        failure.message
                    );
                    item.failure = Some(failure);
                    item.reset();
                    if !run.is_cancelled() {
                        retry_in = Some(delay);
                    }
                }
                RetryDecision::NoRetry => {
                    tracing::warn!(queue = %id, item = %item.id, "queue item failed: {}", failure.message);
                    item.status = DownloadStatus::Failed;
                    item.failure = Some(failure);
                    item.completed_at = Some(unix_timestamp());
                    st.queue.failed_items += 1;
                }
            }
        }
        st.finish_if_settled()
    };

    if finished {
        let q = record.snapshot();
        tracing::info!(
            queue = %id,
            status = %q.status,
            completed = q.completed_items,
            failed = q.failed_items,
            "queue finished"
        );
        record.release_waiters();
    }
    shared.publish(record);
    retry_in
}
