//! Queue scheduler: many downloads as one batch.
//!
//! Two independent budgets apply: the queue gate bounds how many items
//! download at once, and each item's download has its own segment gate.
//! Failed items are retried with a fixed delay; an item's failure is only
//! counted once its retries are spent.

mod dispatch;
mod record;
mod scheduler;
mod types;

pub use scheduler::{QueueOptions, QueueScheduler};
pub use types::{DownloadQueue, QueueError, QueueItem, QueueProgress, QueueStatus};
