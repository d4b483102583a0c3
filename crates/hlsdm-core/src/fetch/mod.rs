//! Segment fetcher: one gated, cancellable segment retrieval.
//!
//! Waits for a gate permit, re-checks the download's halt flags, then runs
//! the blocking transport on the blocking pool. Cancellation is reported as
//! its own outcome so the controller never mistakes it for a content error.

mod error;
mod transport;

pub use error::FetchError;
pub use transport::{CurlTransport, SegmentTransport};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::cancel::CancelToken;
use crate::gate::Gate;

/// Result of one segment dispatch.
#[derive(Debug)]
pub enum SegmentOutcome {
    /// Segment body retrieved.
    Fetched(Vec<u8>),
    /// Not started because a sibling segment already failed.
    Skipped,
    /// Stopped by the download's cancellation signal (before or during the fetch).
    Cancelled,
    /// Transport or HTTP failure.
    Failed(FetchError),
}

/// Everything a segment fetch needs besides its own index and URL.
#[derive(Clone)]
pub struct FetchContext {
    pub transport: Arc<dyn SegmentTransport>,
    pub gate: Gate,
    pub cancel: CancelToken,
    /// One-way flag raised by the first segment failure of the download.
    pub halted: Arc<AtomicBool>,
}

impl FetchContext {
    fn halted(&self) -> bool {
        self.halted.load(Ordering::Acquire)
    }
}

/// Fetch segment `index` from `url` under the context's gate.
pub async fn fetch_segment(ctx: &FetchContext, index: usize, url: String) -> SegmentOutcome {
    if ctx.cancel.is_cancelled() {
        return SegmentOutcome::Cancelled;
    }
    if ctx.halted() {
        return SegmentOutcome::Skipped;
    }

    let Ok(_permit) = ctx.gate.acquire(&ctx.cancel).await else {
        return SegmentOutcome::Cancelled;
    };
    if ctx.cancel.is_cancelled() {
        return SegmentOutcome::Cancelled;
    }
    if ctx.halted() {
        return SegmentOutcome::Skipped;
    }

    tracing::trace!(index, %url, "segment fetch start");
    let transport = Arc::clone(&ctx.transport);
    let cancel = ctx.cancel.clone();
    let joined = tokio::task::spawn_blocking(move || transport.fetch(&url, &cancel)).await;

    let outcome = match joined {
        Ok(Ok(_)) | Ok(Err(FetchError::Cancelled)) if ctx.cancel.is_cancelled() => {
            SegmentOutcome::Cancelled
        }
        Ok(Ok(bytes)) => SegmentOutcome::Fetched(bytes),
        Ok(Err(FetchError::Cancelled)) => SegmentOutcome::Cancelled,
        Ok(Err(e)) if ctx.cancel.is_cancelled() => {
            tracing::trace!(index, "segment error after cancel: {}", e);
            SegmentOutcome::Cancelled
        }
        Ok(Err(e)) => SegmentOutcome::Failed(e),
        Err(join) => SegmentOutcome::Failed(FetchError::Other(format!("fetch task join: {}", join))),
    };
    if matches!(outcome, SegmentOutcome::Failed(_)) {
        // Raised while the permit is still held, so the next waiter sees it.
        ctx.halted.store(true, Ordering::Release);
    }
    outcome
}
