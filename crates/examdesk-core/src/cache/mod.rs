//! Persistent TTL caching.
//!
//! This module provides the `TtlStore`, a per-namespace time-to-live cache
//! over a synchronous key/value `StorageMedium`. Entries are stored as JSON
//! `{data, timestamp}` pairs and expire lazily when read.
//!
//! Namespaces in use:
//! - `adminDashboard`: per-career metrics, 5 minute TTL
//! - `adminTables`: grouped exam tables, 10 minute TTL

pub mod error;
pub mod medium;
pub mod store;

pub use error::StorageError;
pub use medium::{FileStorage, MemoryStorage, StorageMedium};
pub use store::{CacheKey, CachedData, TtlStore};
