//! Navigation prefetching.
//!
//! This module provides:
//! - `PrefetchScheduler`: warms targets in idle time under an in-flight cap
//! - `IdleScheduler`: when idle work runs (idle signal with timeout, or timer)
//! - the role-specific prefetch plan and hover-link filtering

pub mod idle;
pub mod plan;
pub mod scheduler;

pub use idle::{
    select_idle_scheduler, IdleCallbackScheduler, IdleScheduler, IdleSignal, IdleStrategy,
    IdleTask, TimerScheduler, DEFAULT_FALLBACK_DELAY_MS, DEFAULT_IDLE_TIMEOUT_MS,
};
pub use plan::{critical_routes, ConnectionInfo, HoverLink};
pub use scheduler::{
    PrefetchScheduler, PrefetchTarget, TargetResolver, DEFAULT_MAX_CONCURRENT_PREFETCHES,
};
