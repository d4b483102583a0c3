//! Queue scheduler: batches of downloads under a shared stream budget.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::cancel::CancelToken;
use crate::config::{clamp_queue_concurrency, clamp_segment_concurrency, HlsdmConfig};
use crate::download::{unix_timestamp, DownloadController, DownloadStatus};
use crate::ids::{ItemId, QueueId};
use crate::registry::Registry;
use crate::retry::RetryPolicy;

use super::dispatch::dispatch;
use super::record::{QueueRecord, QueueState};
use super::types::{DownloadQueue, QueueError, QueueItem, QueueProgress, QueueStatus};

const EVENT_CAPACITY: usize = 1024;

/// Per-item settings shared by every queue of a scheduler.
#[derive(Debug, Clone, Copy)]
pub struct QueueOptions {
    /// Segments fetched at once by each item's download (1–8).
    pub item_concurrency: usize,
    pub retry: RetryPolicy,
}

impl Default for QueueOptions {
    fn default() -> Self {
        Self {
            item_concurrency: 4,
            retry: RetryPolicy::default(),
        }
    }
}

impl QueueOptions {
    pub fn from_config(cfg: &HlsdmConfig) -> Self {
        Self {
            item_concurrency: clamp_segment_concurrency(cfg.queue_segment_concurrency),
            retry: RetryPolicy::from_config(cfg),
        }
    }
}

pub(super) struct Shared {
    pub(super) controller: DownloadController,
    pub(super) options: QueueOptions,
    queues: Registry<QueueId, QueueRecord>,
    item_ids: AtomicU64,
    events: broadcast::Sender<QueueProgress>,
}

impl Shared {
    fn progress_of(&self, st: &QueueState) -> QueueProgress {
        st.progress(|download| {
            self.controller
                .progress(download)
                .filter(|p| p.status == DownloadStatus::Downloading)
                .map(|p| p.download_speed)
                .unwrap_or(0.0)
        })
    }

    pub(super) fn publish(&self, record: &QueueRecord) {
        let progress = self.progress_of(&record.lock());
        let _ = self.events.send(progress);
    }
}

/// Runs batches of downloads. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct QueueScheduler {
    shared: Arc<Shared>,
}

impl QueueScheduler {
    pub fn new(controller: DownloadController, options: QueueOptions) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                controller,
                options: QueueOptions {
                    item_concurrency: clamp_segment_concurrency(options.item_concurrency),
                    ..options
                },
                queues: Registry::new(),
                item_ids: AtomicU64::new(1),
                events,
            }),
        }
    }

    pub fn from_config(controller: DownloadController, cfg: &HlsdmConfig) -> Self {
        Self::new(controller, QueueOptions::from_config(cfg))
    }

    pub fn controller(&self) -> &DownloadController {
        &self.shared.controller
    }

    /// Create a queue with one item per URL and start dispatching it.
    ///
    /// `titles[i]` names item `i`; missing or blank titles become "Video <n>".
    /// `max_concurrency` (streams at once) is clamped to 1–5. Must be called
    /// inside a tokio runtime.
    pub fn submit_batch(
        &self,
        urls: &[String],
        titles: &[String],
        max_concurrency: usize,
        name: Option<&str>,
    ) -> Result<QueueId, QueueError> {
        let urls: Vec<&str> = urls.iter().map(|u| u.trim()).filter(|u| !u.is_empty()).collect();
        if urls.is_empty() {
            return Err(QueueError::EmptyBatch);
        }
        let max_concurrent = clamp_queue_concurrency(max_concurrency);
        let max_retries = self.shared.options.retry.max_retries;
        let now = unix_timestamp();

        let (id, record) = self.shared.queues.insert_with(|id| {
            let items: Vec<QueueItem> = urls
                .iter()
                .enumerate()
                .map(|(i, url)| QueueItem {
                    id: ItemId::from(self.shared.item_ids.fetch_add(1, Ordering::Relaxed)),
                    queue_id: id,
                    url: url.to_string(),
                    title: titles
                        .get(i)
                        .map(|t| t.trim())
                        .filter(|t| !t.is_empty())
                        .map(str::to_string)
                        .unwrap_or_else(|| format!("Video {}", i + 1)),
                    status: DownloadStatus::Pending,
                    progress: 0,
                    download_id: None,
                    total_segments: 0,
                    downloaded_segments: 0,
                    priority: i,
                    retry_count: 0,
                    max_retries,
                    added_at: now,
                    completed_at: None,
                    file_size: None,
                    file_ref: None,
                    failure: None,
                })
                .collect();
            QueueRecord::new(DownloadQueue {
                id,
                name: name
                    .map(str::trim)
                    .filter(|n| !n.is_empty())
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("Batch {}", id.get())),
                total_items: items.len(),
                items,
                status: QueueStatus::Idle,
                max_concurrent,
                created_at: now,
                completed_at: None,
                completed_items: 0,
                failed_items: 0,
            })
        });
        tracing::info!(queue = %id, items = urls.len(), max_concurrent, "queue created");
        self.shared.publish(&record);

        let run = {
            let mut st = record.lock();
            st.queue.status = QueueStatus::Running;
            st.run.clone()
        };
        self.shared.publish(&record);
        tokio::spawn(dispatch(Arc::clone(&self.shared), id, record, run));
        Ok(id)
    }

    /// running → paused. Stops admission and cancels every active item's download;
    /// those items go back to pending and restart from zero on resume.
    pub fn pause(&self, id: QueueId) -> Result<(), QueueError> {
        let record = self.record(id)?;
        let reset = {
            let mut st = record.lock();
            if st.queue.status != QueueStatus::Running {
                return Err(QueueError::InvalidTransition {
                    from: st.queue.status,
                    op: "pause",
                });
            }
            st.queue.status = QueueStatus::Paused;
            st.run.cancel();
            let mut reset = 0;
            for item in st
                .queue
                .items
                .iter_mut()
                .filter(|i| i.status == DownloadStatus::Downloading)
            {
                // A download that already ended is left for its item task to record.
                let stopped = match item.download_id {
                    Some(download) => self.shared.controller.cancel(download),
                    None => true,
                };
                if stopped {
                    item.reset();
                    reset += 1;
                }
            }
            reset
        };
        tracing::info!(queue = %id, reset, "queue paused");
        self.shared.publish(&record);
        Ok(())
    }

    /// paused → running. Re-dispatches pending items; terminal items are untouched.
    pub fn resume(&self, id: QueueId) -> Result<(), QueueError> {
        let record = self.record(id)?;
        let run = {
            let mut st = record.lock();
            if st.queue.status != QueueStatus::Paused {
                return Err(QueueError::InvalidTransition {
                    from: st.queue.status,
                    op: "resume",
                });
            }
            st.queue.status = QueueStatus::Running;
            st.run = CancelToken::new();
            st.run.clone()
        };
        tracing::info!(queue = %id, "queue resumed");
        self.shared.publish(&record);
        tokio::spawn(dispatch(Arc::clone(&self.shared), id, record, run));
        Ok(())
    }

    /// running|paused → failed, permanently. Every unfinished item fails as cancelled.
    pub fn cancel(&self, id: QueueId) -> Result<(), QueueError> {
        let record = self.record(id)?;
        let active = {
            let mut st = record.lock();
            if !matches!(st.queue.status, QueueStatus::Running | QueueStatus::Paused) {
                return Err(QueueError::InvalidTransition {
                    from: st.queue.status,
                    op: "cancel",
                });
            }
            st.run.cancel();
            let active: Vec<_> = st
                .queue
                .items
                .iter()
                .filter(|i| !i.is_terminal())
                .filter_map(|i| i.download_id)
                .collect();
            st.cancel_all();
            active
        };
        for download in active {
            self.shared.controller.cancel(download);
        }
        tracing::info!(queue = %id, "queue cancelled");
        record.release_waiters();
        self.shared.publish(&record);
        Ok(())
    }

    /// Forget a terminal queue.
    pub fn remove(&self, id: QueueId) -> Result<(), QueueError> {
        let record = self.record(id)?;
        let status = record.snapshot().status;
        if !status.is_terminal() {
            return Err(QueueError::InvalidTransition {
                from: status,
                op: "remove",
            });
        }
        self.shared.queues.remove(&id);
        let forgotten = record
            .snapshot()
            .items
            .iter()
            .filter_map(|i| i.download_id)
            .filter(|d| self.shared.controller.remove(*d))
            .count();
        tracing::debug!(queue = %id, forgotten, "queue removed");
        Ok(())
    }

    pub fn snapshot(&self, id: QueueId) -> Option<DownloadQueue> {
        self.shared.queues.get(&id).map(|r| r.snapshot())
    }

    pub fn progress(&self, id: QueueId) -> Option<QueueProgress> {
        let record = self.shared.queues.get(&id)?;
        let st = record.lock();
        Some(self.shared.progress_of(&st))
    }

    /// Snapshots of all queues, oldest first.
    pub fn list(&self) -> Vec<DownloadQueue> {
        self.shared
            .queues
            .entries()
            .into_iter()
            .map(|(_, r)| r.snapshot())
            .collect()
    }

    /// Attach an observer of every queue's progress.
    pub fn subscribe(&self) -> broadcast::Receiver<QueueProgress> {
        self.shared.events.subscribe()
    }

    /// Resolve with the terminal snapshot. None if the id is unknown.
    pub async fn wait(&self, id: QueueId) -> Option<DownloadQueue> {
        let record = self.shared.queues.get(&id)?;
        record.finished().await;
        Some(record.snapshot())
    }

    fn record(&self, id: QueueId) -> Result<Arc<QueueRecord>, QueueError> {
        self.shared.queues.get(&id).ok_or(QueueError::NotFound(id))
    }
}
