use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, warn};

use super::StorageMedium;
use crate::clock::{Clock, SystemClock};

/// Namespaced cache key: `{domain}_{resourceKind}_{discriminator}`.
///
/// Resources without a discriminator use `{domain}_{resourceKind}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(domain: &str, kind: &str, discriminator: &str) -> Self {
        if discriminator.is_empty() {
            Self(format!("{}_{}", domain, kind))
        } else {
            Self(format!("{}_{}_{}", domain, kind, discriminator))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A persisted value and the moment it was written.
///
/// Serialized as `{"data": ..., "timestamp": <epoch millis>}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedData<T> {
    pub data: T,
    #[serde(rename = "timestamp", with = "chrono::serde::ts_milliseconds")]
    pub cached_at: DateTime<Utc>,
}

impl<T> CachedData<T> {
    pub fn new(data: T, cached_at: DateTime<Utc>) -> Self {
        Self { data, cached_at }
    }

    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.cached_at
    }

    /// An entry exactly `ttl` old is already stale.
    pub fn is_stale(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        self.age(now) >= ttl
    }

    pub fn age_display(&self, now: DateTime<Utc>) -> String {
        let minutes = self.age(now).num_minutes();
        if minutes < 1 {
            // Also covers clock skew (negative age)
            "just now".to_string()
        } else if minutes < 60 {
            format!("{}m ago", minutes)
        } else {
            let hours = minutes / 60;
            if minutes % 60 >= 30 {
                format!("{}h ago", hours + 1)
            } else {
                format!("{}h ago", hours)
            }
        }
    }
}

/// TTL cache over a [`StorageMedium`], scoped to one namespace.
///
/// Expiry is lazy: a stale entry is deleted by the `get` that notices it.
/// Every medium failure is logged and treated as a miss or a no-op.
#[derive(Clone)]
pub struct TtlStore {
    medium: Arc<dyn StorageMedium>,
    namespace: String,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl TtlStore {
    pub fn new(medium: Arc<dyn StorageMedium>, namespace: impl Into<String>, ttl: Duration) -> Self {
        Self {
            medium,
            namespace: namespace.into(),
            ttl,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn key(&self, kind: &str, discriminator: &str) -> CacheKey {
        CacheKey::new(&self.namespace, kind, discriminator)
    }

    pub fn get<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        self.get_entry(key).map(|entry| entry.data)
    }

    /// Like [`get`](Self::get) but keeps the write timestamp.
    pub fn get_entry<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<CachedData<T>> {
        let raw = match self.medium.get_item(key.as_str()) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(key = %key, error = %e, "Cache read failed, treating as miss");
                return None;
            }
        };

        let entry: CachedData<T> = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                debug!(key = %key, error = %e, "Discarding unreadable cache entry");
                self.remove(key);
                return None;
            }
        };

        let now = self.clock.now();
        if entry.cached_at > now {
            debug!(key = %key, "Discarding cache entry written in the future");
            self.remove(key);
            return None;
        }

        if entry.is_stale(self.ttl, now) {
            debug!(key = %key, "Cache entry expired");
            self.remove(key);
            return None;
        }

        Some(entry)
    }

    /// Last writer wins; there is no version check.
    pub fn set<T: Serialize>(&self, key: &CacheKey, value: &T) {
        let entry = CachedData::new(value, self.clock.now());
        let contents = match serde_json::to_string(&entry) {
            Ok(contents) => contents,
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to serialize cache entry, skipping write");
                return;
            }
        };

        if let Err(e) = self.medium.set_item(key.as_str(), &contents) {
            warn!(key = %key, error = %e, "Cache write failed, skipping");
        }
    }

    pub fn clear(&self, key: &CacheKey) {
        self.remove(key);
    }

    /// Remove every entry whose key starts with `prefix`. Returns how many
    /// keys were removed.
    pub fn clear_namespace(&self, prefix: &str) -> usize {
        let keys = match self.medium.keys() {
            Ok(keys) => keys,
            Err(e) => {
                warn!(prefix, error = %e, "Failed to list cache keys, nothing cleared");
                return 0;
            }
        };

        let mut removed = 0;
        for key in keys.iter().filter(|k| k.starts_with(prefix)) {
            match self.medium.remove_item(key) {
                Ok(()) => removed += 1,
                Err(e) => warn!(key = %key, error = %e, "Failed to remove cache entry"),
            }
        }
        debug!(prefix, removed, "Cleared cache namespace");
        removed
    }

    /// Clear everything this store's namespace owns.
    pub fn clear_all(&self) -> usize {
        let prefix = format!("{}_", self.namespace);
        self.clear_namespace(&prefix)
    }

    fn remove(&self, key: &CacheKey) {
        if let Err(e) = self.medium.remove_item(key.as_str()) {
            warn!(key = %key, error = %e, "Failed to remove cache entry");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryStorage;
    use crate::clock::{Clock, ManualClock};
    use crate::testing::FailingStorage;

    fn store_with(medium: Arc<MemoryStorage>, clock: &ManualClock) -> TtlStore {
        TtlStore::new(medium, "adminDashboard", Duration::minutes(5))
            .with_clock(Arc::new(clock.clone()))
    }

    #[test]
    fn test_cache_key_format() {
        assert_eq!(
            CacheKey::new("adminDashboard", "globalPerformance", "7").as_str(),
            "adminDashboard_globalPerformance_7"
        );
        assert_eq!(
            CacheKey::new("adminTables", "examTablesGrouped", "").as_str(),
            "adminTables_examTablesGrouped"
        );
    }

    #[test]
    fn test_entry_serializes_with_millis_timestamp() {
        let at = DateTime::from_timestamp_millis(1_700_000_000_123).unwrap();
        let json = serde_json::to_value(CachedData::new(vec![1, 2], at)).unwrap();
        assert_eq!(json["timestamp"], 1_700_000_000_123i64);
        assert_eq!(json["data"], serde_json::json!([1, 2]));
    }

    #[test]
    fn test_get_just_before_ttl_returns_value() {
        let medium = Arc::new(MemoryStorage::new());
        let clock = ManualClock::default();
        let store = store_with(medium.clone(), &clock);
        let key = store.key("globalPerformance", "7");

        store.set(&key, &serde_json::json!({"avg": 7.5}));
        clock.advance(Duration::minutes(5) - Duration::milliseconds(1));

        assert_eq!(
            store.get::<serde_json::Value>(&key),
            Some(serde_json::json!({"avg": 7.5}))
        );
    }

    #[test]
    fn test_get_after_ttl_expires_and_removes_entry() {
        let medium = Arc::new(MemoryStorage::new());
        let clock = ManualClock::default();
        let store = store_with(medium.clone(), &clock);
        let key = store.key("globalPerformance", "7");

        store.set(&key, &42);
        clock.advance(Duration::minutes(5) + Duration::milliseconds(1));

        assert_eq!(store.get::<i32>(&key), None);
        assert_eq!(medium.get_item(key.as_str()).unwrap(), None);
    }

    #[test]
    fn test_get_exactly_at_ttl_is_stale() {
        let medium = Arc::new(MemoryStorage::new());
        let clock = ManualClock::default();
        let store = store_with(medium.clone(), &clock);
        let key = store.key("prediction", "3");

        store.set(&key, &1);
        clock.advance(Duration::minutes(5));
        assert_eq!(store.get::<i32>(&key), None);
    }

    #[test]
    fn test_future_dated_entry_is_removed() {
        let medium = Arc::new(MemoryStorage::new());
        let clock = ManualClock::default();
        let store = store_with(medium.clone(), &clock);
        let key = store.key("globalPerformance", "7");

        let entry = CachedData::new(42, clock.now() + Duration::days(1));
        medium
            .set_item(key.as_str(), &serde_json::to_string(&entry).unwrap())
            .unwrap();
        clock.advance(Duration::hours(6));

        assert_eq!(store.get::<i32>(&key), None);
        assert_eq!(medium.get_item(key.as_str()).unwrap(), None);
    }

    #[test]
    fn test_set_overwrites_previous_entry() {
        let medium = Arc::new(MemoryStorage::new());
        let clock = ManualClock::default();
        let store = store_with(medium, &clock);
        let key = store.key("registrations", "2");

        store.set(&key, &"first");
        store.set(&key, &"second");
        assert_eq!(store.get::<String>(&key), Some("second".to_string()));
    }

    #[test]
    fn test_unreadable_entry_is_miss_and_removed() {
        let medium = Arc::new(MemoryStorage::new());
        let clock = ManualClock::default();
        let store = store_with(medium.clone(), &clock);
        let key = store.key("globalPerformance", "1");

        medium.set_item(key.as_str(), "{not json").unwrap();
        assert_eq!(store.get::<i32>(&key), None);
        assert_eq!(medium.get_item(key.as_str()).unwrap(), None);
    }

    #[test]
    fn test_failing_medium_is_fail_open() {
        let store = TtlStore::new(Arc::new(FailingStorage), "adminTables", Duration::minutes(10));
        let key = store.key("examTablesGrouped", "");

        store.set(&key, &vec![1, 2, 3]);
        assert_eq!(store.get::<Vec<i32>>(&key), None);
        store.clear(&key);
        assert_eq!(store.clear_all(), 0);
    }

    #[test]
    fn test_clear_namespace_only_touches_prefix() {
        let medium = Arc::new(MemoryStorage::new());
        let clock = ManualClock::default();
        let store = store_with(medium.clone(), &clock);

        store.set(&store.key("globalPerformance", "1"), &1);
        store.set(&store.key("prediction", "1"), &2);
        medium.set_item("adminTables_examTablesGrouped", "[]").unwrap();
        medium.set_item("access_token", "token").unwrap();

        assert_eq!(store.clear_all(), 2);
        assert_eq!(
            medium.keys().unwrap(),
            vec!["access_token", "adminTables_examTablesGrouped"]
        );
    }

    #[test]
    fn test_clear_namespace_is_idempotent() {
        let medium = Arc::new(MemoryStorage::new());
        let clock = ManualClock::default();
        let store = store_with(medium.clone(), &clock);
        store.set(&store.key("globalPerformance", "1"), &1);

        assert_eq!(store.clear_namespace("adminDashboard_"), 1);
        let after_first = medium.keys().unwrap();
        assert_eq!(store.clear_namespace("adminDashboard_"), 0);
        assert_eq!(medium.keys().unwrap(), after_first);
    }

    #[test]
    fn test_age_display() {
        let now = Utc::now();
        assert_eq!(CachedData::new((), now).age_display(now), "just now");
        assert_eq!(
            CachedData::new((), now - Duration::minutes(7)).age_display(now),
            "7m ago"
        );
        assert_eq!(
            CachedData::new((), now - Duration::minutes(95)).age_display(now),
            "2h ago"
        );
        // Clock skew
        assert_eq!(
            CachedData::new((), now + Duration::minutes(2)).age_display(now),
            "just now"
        );
    }
}
