use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use crate::api::FetchError;
use crate::cache::{CacheKey, TtlStore};
use crate::models::is_empty_payload;

/// Remote read behind a fetch cell.
///
/// `Ok(None)` means the server answered with no data.
#[async_trait]
pub trait Loader<T>: Send + Sync {
    async fn load(&self, discriminator: &str) -> Result<Option<T>, FetchError>;
}

/// Adapts an async closure into a [`Loader`].
pub struct FnLoader<F>(F);

pub fn loader_fn<F>(f: F) -> FnLoader<F> {
    FnLoader(f)
}

#[async_trait]
impl<T, F, Fut> Loader<T> for FnLoader<F>
where
    T: Send + 'static,
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Option<T>, FetchError>> + Send,
{
    async fn load(&self, discriminator: &str) -> Result<Option<T>, FetchError> {
        (self.0)(discriminator.to_string()).await
    }
}

/// Observable state of a [`FetchCell`].
#[derive(Debug, Clone, PartialEq)]
pub struct FetchCellState<T> {
    pub data: Option<T>,
    pub is_loading: bool,
    pub error: Option<String>,
    pub last_loaded_at: Option<DateTime<Utc>>,
}

impl<T> Default for FetchCellState<T> {
    fn default() -> Self {
        Self {
            data: None,
            is_loading: false,
            error: None,
            last_loaded_at: None,
        }
    }
}

/// Clears `is_loading` when the fetch ends, whichever way it ends.
struct LoadingGuard<'a, T> {
    state: &'a Mutex<FetchCellState<T>>,
}

impl<T> Drop for LoadingGuard<'_, T> {
    fn drop(&mut self) {
        self.state.lock().is_loading = false;
    }
}

/// Cache-first view of one logical resource, e.g. "performance for career X".
///
/// The backing [`TtlStore`] is the source of truth for whether a value is
/// still usable; the cell only keeps what the view needs to render. Two
/// fetches racing on the same cell may both reach the loader, and the last
/// one to finish wins `data`. The first of them to finish also clears
/// `is_loading` while the other is still loading. No lock is held across
/// the loader call.
pub struct FetchCell<T> {
    kind: String,
    store: TtlStore,
    loader: Arc<dyn Loader<T>>,
    state: Mutex<FetchCellState<T>>,
}

impl<T> FetchCell<T>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    pub fn new(kind: impl Into<String>, store: TtlStore, loader: Arc<dyn Loader<T>>) -> Self {
        Self {
            kind: kind.into(),
            store,
            loader,
            state: Mutex::new(FetchCellState::default()),
        }
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn key(&self, discriminator: &str) -> CacheKey {
        self.store.key(&self.kind, discriminator)
    }

    /// Return the cached value when fresh, otherwise load it.
    ///
    /// Loader failures never escape: they land in [`error`](Self::error) and
    /// the previous `data` is kept.
    pub async fn fetch(&self, discriminator: &str, force_refresh: bool) -> Option<T> {
        {
            let mut state = self.state.lock();
            state.is_loading = true;
            state.error = None;
        }
        let _loading = LoadingGuard { state: &self.state };

        let key = self.key(discriminator);

        if !force_refresh {
            if let Some(cached) = self.store.get::<T>(&key) {
                debug!(key = %key, "Serving from cache");
                self.state.lock().data = Some(cached.clone());
                return Some(cached);
            }
        }

        match self.loader.load(discriminator).await {
            Ok(Some(value)) if !is_empty(&value) => {
                self.store.set(&key, &value);
                let mut state = self.state.lock();
                state.data = Some(value.clone());
                state.last_loaded_at = Some(self.store.clock().now());
                Some(value)
            }
            Ok(result) => {
                debug!(key = %key, "Loader returned no data, not caching");
                self.state.lock().data = result.clone();
                result
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Fetch failed");
                self.state.lock().error = Some(e.user_message());
                None
            }
        }
    }

    /// True when the last successful load is younger than the store TTL.
    ///
    /// Judged on the in-memory timestamp only, not on the store entry.
    pub fn is_data_fresh(&self) -> bool {
        match self.state.lock().last_loaded_at {
            Some(loaded_at) => self.store.clock().now() - loaded_at < self.store.ttl(),
            None => false,
        }
    }

    /// How long ago the cached entry for `discriminator` was written, e.g.
    /// `5m ago`. None when nothing usable is cached.
    pub fn cache_age(&self, discriminator: &str) -> Option<String> {
        let entry = self.store.get_entry::<T>(&self.key(discriminator))?;
        Some(entry.age_display(self.store.clock().now()))
    }

    /// Drop the cached entry for `discriminator` and forget the loaded data.
    pub fn clear(&self, discriminator: &str) {
        self.store.clear(&self.key(discriminator));
        let mut state = self.state.lock();
        state.data = None;
        state.last_loaded_at = None;
    }

    /// Restore the initial in-memory state. The store is left alone.
    pub fn reset(&self) {
        *self.state.lock() = FetchCellState::default();
    }

    pub fn state(&self) -> FetchCellState<T> {
        self.state.lock().clone()
    }

    pub fn data(&self) -> Option<T> {
        self.state.lock().data.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.state.lock().is_loading
    }

    pub fn error(&self) -> Option<String> {
        self.state.lock().error.clone()
    }

    pub fn last_loaded_at(&self) -> Option<DateTime<Utc>> {
        self.state.lock().last_loaded_at
    }
}

fn is_empty<T: Serialize>(value: &T) -> bool {
    serde_json::to_value(value)
        .map(|v| is_empty_payload(&v))
        .unwrap_or(false)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::Duration;
    use serde_json::{json, Value};

    use crate::cache::{MemoryStorage, StorageMedium};
    use crate::clock::{Clock, ManualClock};
    use crate::testing::FailingStorage;

    struct Fixture {
        medium: Arc<MemoryStorage>,
        clock: ManualClock,
        calls: Arc<AtomicUsize>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                medium: Arc::new(MemoryStorage::new()),
                clock: ManualClock::default(),
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn store(&self) -> TtlStore {
            TtlStore::new(self.medium.clone(), "adminDashboard", Duration::minutes(5))
                .with_clock(Arc::new(self.clock.clone()))
        }

        fn cell_returning(&self, result: Result<Option<Value>, FetchError>) -> FetchCell<Value> {
            let calls = self.calls.clone();
            let loader = loader_fn(move |_career: String| {
                let result = result.clone();
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    result
                }
            });
            FetchCell::new("globalPerformance", self.store(), Arc::new(loader))
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[tokio::test]
    async fn test_miss_loads_and_writes_through() {
        let fx = Fixture::new();
        let cell = fx.cell_returning(Ok(Some(json!({"avg": 8.1}))));

        let value = cell.fetch("3", false).await;

        assert_eq!(value, Some(json!({"avg": 8.1})));
        assert_eq!(fx.calls(), 1);
        assert!(fx
            .medium
            .get_item("adminDashboard_globalPerformance_3")
            .unwrap()
            .is_some());
        let state = cell.state();
        assert!(!state.is_loading);
        assert_eq!(state.error, None);
        assert_eq!(state.last_loaded_at, Some(fx.clock.now()));
    }

    #[tokio::test]
    async fn test_cache_age_reports_entry_age() {
        let fx = Fixture::new();
        let cell = fx.cell_returning(Ok(Some(json!({"avg": 6.0}))));
        assert_eq!(cell.cache_age("3"), None);

        cell.fetch("3", false).await;
        assert_eq!(cell.cache_age("3").as_deref(), Some("just now"));

        fx.clock.advance(Duration::minutes(3));
        assert_eq!(cell.cache_age("3").as_deref(), Some("3m ago"));

        // Expired entries report nothing
        fx.clock.advance(Duration::minutes(2));
        assert_eq!(cell.cache_age("3"), None);
    }

    #[tokio::test]
    async fn test_hit_skips_loader() {
        let fx = Fixture::new();
        fx.store().set(&fx.store().key("globalPerformance", "3"), &json!([1, 2]));
        let cell = fx.cell_returning(Ok(Some(json!("unused"))));

        let value = cell.fetch("3", false).await;

        assert_eq!(value, Some(json!([1, 2])));
        assert_eq!(fx.calls(), 0);
        assert_eq!(cell.data(), Some(json!([1, 2])));
        assert!(!cell.is_loading());
    }

    #[tokio::test]
    async fn test_force_refresh_bypasses_cache() {
        let fx = Fixture::new();
        fx.store().set(&fx.store().key("globalPerformance", "3"), &json!("old"));
        let cell = fx.cell_returning(Ok(Some(json!("new"))));

        assert_eq!(cell.fetch("3", true).await, Some(json!("new")));
        assert_eq!(fx.calls(), 1);
        assert_eq!(
            fx.store().get::<Value>(&cell.key("3")),
            Some(json!("new"))
        );
    }

    #[tokio::test]
    async fn test_stale_entry_triggers_reload() {
        let fx = Fixture::new();
        fx.store().set(&fx.store().key("globalPerformance", "3"), &json!("old"));
        fx.clock.advance(Duration::minutes(6));
        let cell = fx.cell_returning(Ok(Some(json!("new"))));

        assert_eq!(cell.fetch("3", false).await, Some(json!("new")));
        assert_eq!(fx.calls(), 1);
    }

    #[tokio::test]
    async fn test_empty_result_is_not_cached() {
        let fx = Fixture::new();
        let cell = fx.cell_returning(Ok(Some(json!([]))));

        assert_eq!(cell.fetch("9", false).await, Some(json!([])));
        assert_eq!(cell.data(), Some(json!([])));
        assert_eq!(cell.last_loaded_at(), None);
        assert_eq!(
            fx.medium.get_item("adminDashboard_globalPerformance_9").unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_null_result_leaves_prior_entry_unchanged() {
        let fx = Fixture::new();
        let key = fx.store().key("globalPerformance", "9");
        fx.store().set(&key, &json!("prior"));
        let before = fx.medium.get_item(key.as_str()).unwrap();
        let cell = fx.cell_returning(Ok(None));

        assert_eq!(cell.fetch("9", true).await, None);
        assert_eq!(cell.data(), None);
        assert_eq!(fx.medium.get_item(key.as_str()).unwrap(), before);
    }

    #[tokio::test]
    async fn test_failure_sets_error_and_keeps_data() {
        let fx = Fixture::new();
        fx.store().set(&fx.store().key("globalPerformance", "3"), &json!("cached"));
        let cell = fx.cell_returning(Err(FetchError::NetworkUnreachable("refused".into())));

        assert_eq!(cell.fetch("3", false).await, Some(json!("cached")));
        assert_eq!(cell.fetch("3", true).await, None);

        let state = cell.state();
        assert_eq!(state.data, Some(json!("cached")));
        assert_eq!(
            state.error.as_deref(),
            Some("Could not connect to the server. Check your connection")
        );
        assert!(!state.is_loading);
    }

    #[tokio::test]
    async fn test_next_fetch_clears_previous_error() {
        let fx = Fixture::new();
        let cell = fx.cell_returning(Err(FetchError::ServerRejected {
            status: 500,
            detail: Some("boom".into()),
        }));
        cell.fetch("3", false).await;
        assert_eq!(cell.error().as_deref(), Some("boom"));

        fx.store().set(&cell.key("3"), &json!(1));
        cell.fetch("3", false).await;
        assert_eq!(cell.error(), None);
    }

    #[tokio::test]
    async fn test_unavailable_storage_fails_open() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let loader = loader_fn(move |_d: String| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Some(json!({"ok": true})))
            }
        });
        let store = TtlStore::new(Arc::new(FailingStorage), "adminDashboard", Duration::minutes(5));
        let cell: FetchCell<Value> = FetchCell::new("prediction", store, Arc::new(loader));

        assert_eq!(cell.fetch("1", false).await, Some(json!({"ok": true})));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cell.error(), None);
    }

    #[tokio::test]
    async fn test_is_data_fresh_tracks_last_load() {
        let fx = Fixture::new();
        let cell = fx.cell_returning(Ok(Some(json!(1))));
        assert!(!cell.is_data_fresh());

        cell.fetch("3", false).await;
        assert!(cell.is_data_fresh());

        fx.clock.advance(Duration::minutes(5));
        assert!(!cell.is_data_fresh());
    }

    #[tokio::test]
    async fn test_is_data_fresh_ignores_store_expiry() {
        let fx = Fixture::new();
        let cell = fx.cell_returning(Ok(Some(json!(1))));
        cell.fetch("3", false).await;

        // Entry removed behind the cell's back
        fx.medium.remove_item(cell.key("3").as_str()).unwrap();
        assert!(cell.is_data_fresh());
    }

    #[tokio::test]
    async fn test_clear_and_reset() {
        let fx = Fixture::new();
        let cell = fx.cell_returning(Ok(Some(json!(1))));
        cell.fetch("3", false).await;

        cell.clear("3");
        assert_eq!(cell.data(), None);
        assert!(!cell.is_data_fresh());
        assert_eq!(fx.medium.get_item(cell.key("3").as_str()).unwrap(), None);

        cell.fetch("3", false).await;
        cell.reset();
        assert_eq!(cell.state(), FetchCellState::default());
        // Reset only touches memory
        assert!(fx.medium.get_item(cell.key("3").as_str()).unwrap().is_some());
    }
}
