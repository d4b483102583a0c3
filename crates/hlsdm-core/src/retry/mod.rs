//! Retry policy for queue items.
//!
//! Fixed count, fixed delay. Only queue items are retried; single downloads
//! never are. A user cancel is never retried.

mod policy;

pub use policy::{RetryDecision, RetryPolicy, DEFAULT_MAX_RETRIES};
