//! Idle-time scheduling.
//!
//! Background work is handed to an [`IdleScheduler`], which decides when it
//! runs. Two flavors exist and one is picked at startup from configuration:
//!
//! - [`IdleCallbackScheduler`]: runs when the host signals it is idle, but no
//!   later than a timeout, so the work still happens under sustained load
//! - [`TimerScheduler`]: runs after a fixed delay, for hosts that never
//!   signal idleness
//!
//! Both spawn onto the current tokio runtime and must be called from within
//! one.

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tracing::trace;

/// Upper bound on how long idle work waits for an idle signal.
pub const DEFAULT_IDLE_TIMEOUT_MS: u64 = 2000;

/// Delay used when no idle signal is available.
pub const DEFAULT_FALLBACK_DELAY_MS: u64 = 1000;

pub type IdleTask = BoxFuture<'static, ()>;

pub trait IdleScheduler: Send + Sync {
    fn run_when_idle(&self, task: IdleTask);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdleStrategy {
    #[default]
    IdleCallback,
    Timer,
}

/// Handle the host uses to announce that foreground work is done.
#[derive(Clone, Default)]
pub struct IdleSignal(Arc<Notify>);

impl IdleSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Release every task currently waiting for idle time.
    pub fn notify_idle(&self) {
        self.0.notify_waiters();
    }
}

pub struct IdleCallbackScheduler {
    signal: IdleSignal,
    timeout: Duration,
}

impl IdleCallbackScheduler {
    pub fn new(signal: IdleSignal, timeout: Duration) -> Self {
        Self { signal, timeout }
    }
}

impl IdleScheduler for IdleCallbackScheduler {
    fn run_when_idle(&self, task: IdleTask) {
        let notify = self.signal.0.clone();
        let timeout = self.timeout;
        tokio::spawn(async move {
            tokio::select! {
                _ = notify.notified() => trace!("Running idle task on idle signal"),
                _ = tokio::time::sleep(timeout) => trace!("Running idle task on timeout"),
            }
            task.await;
        });
    }
}

pub struct TimerScheduler {
    delay: Duration,
}

impl TimerScheduler {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl IdleScheduler for TimerScheduler {
    fn run_when_idle(&self, task: IdleTask) {
        let delay = self.delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            task.await;
        });
    }
}

/// Build the scheduler for `strategy`.
///
/// The idle signal is returned only for the idle-callback flavor; the host
/// keeps it and fires it when it has nothing better to do.
pub fn select_idle_scheduler(
    strategy: IdleStrategy,
    idle_timeout: Duration,
    fallback_delay: Duration,
) -> (Arc<dyn IdleScheduler>, Option<IdleSignal>) {
    match strategy {
        IdleStrategy::IdleCallback => {
            let signal = IdleSignal::new();
            let scheduler = IdleCallbackScheduler::new(signal.clone(), idle_timeout);
            (Arc::new(scheduler), Some(signal))
        }
        IdleStrategy::Timer => (Arc::new(TimerScheduler::new(fallback_delay)), None),
    }
}
