//! Core of the HLS stream download manager: playlist resolution, gated
//! segment fetching, ordered merge, and batch queues with retry.

pub mod cancel;
pub mod config;
pub mod control;
pub mod download;
pub mod fetch;
pub mod gate;
pub mod history;
pub mod ids;
pub mod logging;
pub mod merge;
pub mod naming;
pub mod playlist;
pub mod queue;
pub mod registry;
pub mod retry;

#[cfg(test)]
pub(crate) mod testing;

