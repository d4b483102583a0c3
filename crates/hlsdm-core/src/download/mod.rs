//! Download controller: one stream's fetch-and-merge lifecycle.
//!
//! Every segment is dispatched as its own task under a per-download gate.
//! Completed bytes land in an ordered slot array; once all fetches settle
//! without error or cancel, the slots are merged in index order.

mod controller;
mod entry;
mod progress;
mod run;
mod types;

pub use controller::{Collaborators, DownloadController, StartError, UNKNOWN_TITLE};
pub use progress::{DownloadProgress, RateStats};
pub use types::{percent, Download, DownloadStatus, Failure, FailureKind};

pub(crate) use types::unix_timestamp;
