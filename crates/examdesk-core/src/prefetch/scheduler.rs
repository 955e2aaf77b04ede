use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::{debug, warn};

use super::idle::IdleScheduler;

/// Maximum simultaneously outstanding target resolutions.
/// Bounds the network and memory cost of speculative work.
pub const DEFAULT_MAX_CONCURRENT_PREFETCHES: usize = 3;

/// A navigational target: a route path.
pub type PrefetchTarget = String;

/// Pre-resolves a target: matches the route and warms whatever it needs.
#[async_trait]
pub trait TargetResolver: Send + Sync {
    async fn resolve(&self, target: &str) -> anyhow::Result<()>;
}

/// Warms likely-next targets during idle time.
///
/// Targets are resolved one after another within a batch. The in-flight cap
/// applies across batches, e.g. a navigation batch overlapping a hover batch.
/// A batch that finds the cap reached stops; nothing is queued for later.
/// Completed targets are remembered for the lifetime of the scheduler.
#[derive(Clone)]
pub struct PrefetchScheduler {
    inner: Arc<Inner>,
}

struct Inner {
    resolver: Arc<dyn TargetResolver>,
    idle: Arc<dyn IdleScheduler>,
    max_concurrent: usize,
    registry: Mutex<HashSet<PrefetchTarget>>,
    in_flight: AtomicUsize,
    pending_batches: AtomicUsize,
    settled: Notify,
}

/// Holds one in-flight slot; releases it on drop.
struct SlotGuard<'a> {
    in_flight: &'a AtomicUsize,
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Marks a scheduled batch as finished on drop.
struct BatchGuard<'a> {
    inner: &'a Inner,
}

impl Drop for BatchGuard<'_> {
    fn drop(&mut self) {
        self.inner.pending_batches.fetch_sub(1, Ordering::SeqCst);
        self.inner.settled.notify_waiters();
    }
}

impl PrefetchScheduler {
    pub fn new(
        resolver: Arc<dyn TargetResolver>,
        idle: Arc<dyn IdleScheduler>,
        max_concurrent: usize,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                resolver,
                idle,
                max_concurrent,
                registry: Mutex::new(HashSet::new()),
                in_flight: AtomicUsize::new(0),
                pending_batches: AtomicUsize::new(0),
                settled: Notify::new(),
            }),
        }
    }

    /// Offer `targets` for background resolution.
    ///
    /// Returns whether a batch was handed to the idle scheduler.
    pub fn schedule<I, S>(&self, targets: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: Into<PrefetchTarget>,
    {
        let pending: Vec<PrefetchTarget> = {
            let registry = self.inner.registry.lock();
            targets
                .into_iter()
                .map(Into::into)
                .filter(|target| !registry.contains(target))
                .collect()
        };

        if pending.is_empty() {
            debug!("Nothing new to prefetch");
            return false;
        }

        let in_flight = self.inner.in_flight.load(Ordering::SeqCst);
        if in_flight >= self.inner.max_concurrent {
            debug!(in_flight, dropped = pending.len(), "Prefetch cap reached, dropping batch");
            return false;
        }

        debug!(targets = ?pending, "Scheduling prefetch batch");
        self.inner.pending_batches.fetch_add(1, Ordering::SeqCst);
        let inner = self.inner.clone();
        self.inner
            .idle
            .run_when_idle(Box::pin(async move { inner.run_batch(pending).await }));
        true
    }

    pub fn is_prefetched(&self, target: &str) -> bool {
        self.inner.registry.lock().contains(target)
    }

    pub fn prefetched_count(&self) -> usize {
        self.inner.registry.lock().len()
    }

    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.load(Ordering::SeqCst)
    }

    /// Wait until every scheduled batch has run to completion.
    pub async fn wait_until_settled(&self) {
        loop {
            let notified = self.inner.settled.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.inner.pending_batches.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }
}

impl Inner {
    async fn run_batch(&self, targets: Vec<PrefetchTarget>) {
        let _batch = BatchGuard { inner: self };

        for target in targets {
            let Some(_slot) = self.try_acquire_slot() else {
                debug!(target = %target, "Prefetch cap reached mid-batch, stopping");
                break;
            };
            if self.registry.lock().contains(&target) {
                continue;
            }

            match self.resolver.resolve(&target).await {
                Ok(()) => {
                    debug!(target = %target, "Prefetched");
                    self.registry.lock().insert(target);
                }
                Err(e) => warn!(target = %target, error = %e, "Failed to prefetch target"),
            }
        }
    }

    /// Take a slot unless the cap is reached. Check and increment are one
    /// atomic step so the cap also holds on a multi-threaded runtime.
    fn try_acquire_slot(&self) -> Option<SlotGuard<'_>> {
        self.in_flight
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n < self.max_concurrent).then_some(n + 1)
            })
            .ok()
            .map(|_| SlotGuard {
                in_flight: &self.in_flight,
            })
    }
}

// ============================================================================
// Tests
// ============================================================================
