//! Persistent download history (SQLite via sqlx).
//!
//! One row per finished download, newest first, trimmed to a configured
//! limit. Exported and imported as a JSON array.

mod db;
mod entries;
mod types;

#[cfg(test)]
mod tests;

pub use db::HistoryDb;
pub use types::{HistoryEntry, HistoryStats};
