//! Concurrency gate: bounds how many fetches (or queue items) run at once.
//!
//! Backed by tokio's FIFO-fair semaphore: a released permit goes to the
//! longest-waiting caller, never to a later one. Acquisition races the
//! caller's cancellation token; an abandoned wait consumes nothing.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::cancel::{CancelToken, Cancelled};

#[derive(Debug)]
struct GateInner {
    semaphore: Arc<Semaphore>,
    permits: usize,
    holders: AtomicUsize,
    peak: AtomicUsize,
}

/// Counting admission gate with a fixed number of permits.
#[derive(Debug, Clone)]
pub struct Gate {
    inner: Arc<GateInner>,
}

impl Gate {
    /// Create a gate with `permits` slots (at least 1).
    pub fn new(permits: usize) -> Self {
        let permits = permits.max(1);
        Self {
            inner: Arc::new(GateInner {
                semaphore: Arc::new(Semaphore::new(permits)),
                permits,
                holders: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }),
        }
    }

    /// Total permits fixed at construction.
    pub fn permits(&self) -> usize {
        self.inner.permits
    }

    /// Permits not currently held.
    pub fn available(&self) -> usize {
        self.inner.semaphore.available_permits()
    }

    /// Number of permits currently held.
    pub fn holders(&self) -> usize {
        self.inner.holders.load(Ordering::Acquire)
    }

    /// Highest number of simultaneous holders seen so far.
    pub fn peak(&self) -> usize {
        self.inner.peak.load(Ordering::Acquire)
    }

    /// Wait for a permit. Returns `Err(Cancelled)` without consuming a permit
    /// if `cancel` is raised before one is granted.
    pub async fn acquire(&self, cancel: &CancelToken) -> Result<GatePermit, Cancelled> {
        cancel.check()?;
        let semaphore = Arc::clone(&self.inner.semaphore);
        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Cancelled),
            permit = semaphore.acquire_owned() => permit,
        };
        // The semaphore is never closed.
        let permit = permit.map_err(|_| Cancelled)?;
        Ok(self.admit(permit))
    }

    /// Take a permit only if one is free right now.
    pub fn try_acquire(&self) -> Option<GatePermit> {
        let permit = Arc::clone(&self.inner.semaphore).try_acquire_owned().ok()?;
        Some(self.admit(permit))
    }

    fn admit(&self, permit: OwnedSemaphorePermit) -> GatePermit {
        let now = self.inner.holders.fetch_add(1, Ordering::AcqRel) + 1;
        self.inner.peak.fetch_max(now, Ordering::AcqRel);
        GatePermit {
            gate: Arc::clone(&self.inner),
            _permit: permit,
        }
    }
}

/// Held permit; returned to the gate when dropped.
#[derive(Debug)]
pub struct GatePermit {
    gate: Arc<GateInner>,
    _permit: OwnedSemaphorePermit,
}

impl Drop for GatePermit {
    fn drop(&mut self) {
        // Decrement before `_permit` drops so a waiter woken by the release never sees a stale count.
        self.gate.holders.fetch_sub(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Run `holds.len()` tasks through a gate of `permits`; each holds its permit
    /// for the given number of milliseconds. Returns the highest concurrency observed.
    fn run_interleaving(permits: usize, holds: &[u64]) -> (usize, Gate) {
        let rt = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(4)
            .enable_time()
            .build()
            .unwrap();
        rt.block_on(async {
            let gate = Gate::new(permits);
            let cancel = CancelToken::new();
            let current = Arc::new(AtomicUsize::new(0));
            let max_seen = Arc::new(AtomicUsize::new(0));
            let mut tasks = Vec::new();
            for &hold in holds {
                let gate = gate.clone();
                let cancel = cancel.clone();
                let current = Arc::clone(&current);
                let max_seen = Arc::clone(&max_seen);
                tasks.push(tokio::spawn(async move {
                    let _permit = gate.acquire(&cancel).await.unwrap();
                    let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                    max_seen.fetch_max(now, Ordering::SeqCst);
                    if hold == 0 {
                        tokio::task::yield_now().await;
                    } else {
                        tokio::time::sleep(Duration::from_millis(hold)).await;
                    }
                    current.fetch_sub(1, Ordering::SeqCst);
                }));
            }
            for t in tasks {
                t.await.unwrap();
            }
            (max_seen.load(Ordering::SeqCst), gate)
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(48))]

        #[test]
        fn never_admits_more_than_permits(
            permits in 1usize..6,
            holds in prop::collection::vec(0u64..6, 1..32),
        ) {
            let (max_seen, gate) = run_interleaving(permits, &holds);
            prop_assert!(max_seen <= permits);
            prop_assert!(gate.peak() <= permits);
            prop_assert!(gate.peak() >= 1);
            prop_assert_eq!(gate.holders(), 0);
            prop_assert_eq!(gate.available(), permits);
        }
    }

    #[tokio::test]
    async fn release_grants_longest_waiter_first() {
        let gate = Gate::new(1);
        let cancel = CancelToken::new();
        let held = gate.acquire(&cancel).await.unwrap();
        let order = Arc::new(Mutex::new(Vec::new()));

        let mut waiters = Vec::new();
        for name in ["first", "second", "third"] {
            let gate = gate.clone();
            let cancel = cancel.clone();
            let order = Arc::clone(&order);
            waiters.push(tokio::spawn(async move {
                let _p = gate.acquire(&cancel).await.unwrap();
                order.lock().unwrap().push(name);
            }));
            // Let this waiter enqueue before the next one.
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        drop(held);
        for w in waiters {
            w.await.unwrap();
        }
        assert_eq!(*order.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn cancelled_wait_does_not_consume_permit() {
        let gate = Gate::new(1);
        let held = gate.acquire(&CancelToken::new()).await.unwrap();

        let token = CancelToken::new();
        let waiter = {
            let gate = gate.clone();
            let token = token.clone();
            tokio::spawn(async move { gate.acquire(&token).await.map(|_| ()) })
        };
        tokio::time::sleep(Duration::from_millis(5)).await;
        token.cancel();
        assert_eq!(waiter.await.unwrap(), Err(Cancelled));

        drop(held);
        assert_eq!(gate.available(), 1);
        assert!(gate.try_acquire().is_some());
    }

    #[tokio::test]
    async fn acquire_with_raised_token_fails_fast() {
        let gate = Gate::new(2);
        let token = CancelToken::new();
        token.cancel();
        assert!(gate.acquire(&token).await.is_err());
        assert_eq!(gate.available(), 2);
    }

    #[test]
    fn zero_permits_clamped_to_one() {
        let gate = Gate::new(0);
        assert_eq!(gate.permits(), 1);
    }
}
