//! Registry record for one queue: state under a lock plus a terminal latch.

use std::sync::{Mutex, MutexGuard};
use std::time::Instant;
use tokio::sync::watch;

use crate::cancel::CancelToken;
use crate::download::{percent, unix_timestamp, DownloadStatus, Failure};
use crate::ids::DownloadId;

use super::types::{DownloadQueue, QueueProgress, QueueStatus};

pub(crate) struct QueueState {
    pub(crate) queue: DownloadQueue,
    pub(crate) started: Instant,
    /// Token of the current dispatch run. Raised by pause and cancel.
    pub(crate) run: CancelToken,
}

impl QueueState {
    /// Mark the queue terminal if every item is. True if this call did it.
    pub(crate) fn finish_if_settled(&mut self) -> bool {
        let q = &mut self.queue;
        if q.status.is_terminal() || !q.all_items_terminal() {
            return false;
        }
        q.status = if q.failed_items < q.total_items {
            QueueStatus::Completed
        } else {
            QueueStatus::Failed
        };
        q.completed_at = Some(unix_timestamp());
        true
    }

    /// Force every non-terminal item to failed ("Download cancelled") and the queue to failed.
    pub(crate) fn cancel_all(&mut self) {
        let now = unix_timestamp();
        let q = &mut self.queue;
        for item in q.items.iter_mut().filter(|i| !i.is_terminal()) {
            item.status = DownloadStatus::Failed;
            item.failure = Some(Failure::cancelled());
            item.completed_at = Some(now);
            q.failed_items += 1;
        }
        q.status = QueueStatus::Failed;
        q.completed_at = Some(now);
    }

    /// Aggregate view; `speed_of` reports the live speed of an active item's download.
    pub(crate) fn progress(&self, speed_of: impl Fn(DownloadId) -> f64) -> QueueProgress {
        let q = &self.queue;
        let settled = q.completed_items + q.failed_items;
        let total_speed = q
            .items
            .iter()
            .filter(|i| i.status == DownloadStatus::Downloading)
            .filter_map(|i| i.download_id)
            .map(speed_of)
            .sum();
        QueueProgress {
            queue_id: q.id,
            total_items: q.total_items,
            completed_items: q.completed_items,
            failed_items: q.failed_items,
            active_items: q.active_items(),
            overall_progress: percent(settled, q.total_items),
            total_speed,
            estimated_time_remaining: eta_secs(
                q.total_items.saturating_sub(settled),
                q.completed_items,
                self.started.elapsed().as_secs_f64(),
            ),
            status: q.status,
        }
    }
}

/// remaining × (elapsed / completed), 0 until something completed.
pub(crate) fn eta_secs(remaining: usize, completed: usize, elapsed_secs: f64) -> u64 {
    if completed == 0 {
        return 0;
    }
    (remaining as f64 * elapsed_secs / completed as f64).round() as u64
}

pub(crate) struct QueueRecord {
    state: Mutex<QueueState>,
    done: watch::Sender<bool>,
}

impl QueueRecord {
    pub(crate) fn new(queue: DownloadQueue) -> Self {
        let (done, _) = watch::channel(false);
        Self {
            state: Mutex::new(QueueState {
                queue,
                started: Instant::now(),
                run: CancelToken::new(),
            }),
            done,
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn snapshot(&self) -> DownloadQueue {
        self.lock().queue.clone()
    }

    /// Set the terminal latch. Call after the queue status became terminal.
    pub(crate) fn release_waiters(&self) {
        self.done.send_replace(true);
    }

    pub(crate) async fn finished(&self) {
        let mut rx = self.done.subscribe();
        let _ = rx.wait_for(|done| *done).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eta_uses_average_time_per_completed_item() {
        assert_eq!(eta_secs(3, 0, 12.0), 0);
        // 2 done in 10 s → 5 s each; 3 left → 15 s.
        assert_eq!(eta_secs(3, 2, 10.0), 15);
        assert_eq!(eta_secs(0, 4, 10.0), 0);
    }
}
