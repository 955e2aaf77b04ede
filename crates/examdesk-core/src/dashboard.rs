//! Administrator data stores.
//!
//! `AdminDashboard` holds the per-career metric cells shown on the
//! administration dashboard; `ExamTablesStore` holds the grouped exam tables
//! and tracks deletions so other views know to refresh.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use tracing::{debug, info};

use crate::api::{ApiClient, FetchError};
use crate::cache::TtlStore;
use crate::fetch::{FetchCell, Loader};
use crate::models::Payload;
use crate::prefetch::TargetResolver;

pub const DASHBOARD_NAMESPACE: &str = "adminDashboard";
pub const TABLES_NAMESPACE: &str = "adminTables";

/// Cache kind of the single exam tables entry.
const EXAM_TABLES_KIND: &str = "examTablesGrouped";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DashboardResource {
    GlobalPerformance,
    Prediction,
    Registrations,
}

impl DashboardResource {
    pub const ALL: [DashboardResource; 3] = [
        DashboardResource::GlobalPerformance,
        DashboardResource::Prediction,
        DashboardResource::Registrations,
    ];

    /// Resource kind segment of the cache key.
    pub fn kind(&self) -> &'static str {
        match self {
            DashboardResource::GlobalPerformance => "globalPerformance",
            DashboardResource::Prediction => "prediction",
            DashboardResource::Registrations => "registrations",
        }
    }
}

// ============================================================================
// Backends
// ============================================================================

/// Remote reads behind the dashboard cells.
#[async_trait]
pub trait DashboardBackend: Send + Sync {
    async fn load(
        &self,
        resource: DashboardResource,
        career_id: &str,
    ) -> Result<Option<Payload>, FetchError>;
}

#[async_trait]
impl DashboardBackend for ApiClient {
    async fn load(
        &self,
        resource: DashboardResource,
        career_id: &str,
    ) -> Result<Option<Payload>, FetchError> {
        match resource {
            DashboardResource::GlobalPerformance => self.fetch_global_performance(career_id).await,
            DashboardResource::Prediction => self.fetch_performance_prediction(career_id).await,
            DashboardResource::Registrations => self.fetch_registration_percentage(career_id).await,
        }
    }
}

/// Remote reads and writes behind the exam tables store.
#[async_trait]
pub trait ExamTablesBackend: Send + Sync {
    async fn load_grouped(&self) -> Result<Option<Payload>, FetchError>;

    async fn delete(&self, table_id: i64) -> Result<(), FetchError>;
}

#[async_trait]
impl ExamTablesBackend for ApiClient {
    async fn load_grouped(&self) -> Result<Option<Payload>, FetchError> {
        self.fetch_exam_tables_by_career().await
    }

    async fn delete(&self, table_id: i64) -> Result<(), FetchError> {
        self.delete_exam_table(table_id).await.map(|_| ())
    }
}

struct DashboardLoader {
    backend: Arc<dyn DashboardBackend>,
    resource: DashboardResource,
}

#[async_trait]
impl Loader<Payload> for DashboardLoader {
    async fn load(&self, career_id: &str) -> Result<Option<Payload>, FetchError> {
        self.backend.load(self.resource, career_id).await
    }
}

struct ExamTablesLoader {
    backend: Arc<dyn ExamTablesBackend>,
}

#[async_trait]
impl Loader<Payload> for ExamTablesLoader {
    async fn load(&self, _discriminator: &str) -> Result<Option<Payload>, FetchError> {
        self.backend.load_grouped().await
    }
}

// ============================================================================
// Admin dashboard
// ============================================================================

pub struct AdminDashboard {
    store: TtlStore,
    performance: FetchCell<Payload>,
    prediction: FetchCell<Payload>,
    registrations: FetchCell<Payload>,
}

impl AdminDashboard {
    pub fn new(store: TtlStore, backend: Arc<dyn DashboardBackend>) -> Self {
        let cell = |resource: DashboardResource| {
            let loader = DashboardLoader {
                backend: backend.clone(),
                resource,
            };
            FetchCell::new(resource.kind(), store.clone(), Arc::new(loader))
        };

        Self {
            performance: cell(DashboardResource::GlobalPerformance),
            prediction: cell(DashboardResource::Prediction),
            registrations: cell(DashboardResource::Registrations),
            store,
        }
    }

    pub fn cell(&self, resource: DashboardResource) -> &FetchCell<Payload> {
        match resource {
            DashboardResource::GlobalPerformance => &self.performance,
            DashboardResource::Prediction => &self.prediction,
            DashboardResource::Registrations => &self.registrations,
        }
    }

    /// Cached-or-loaded metric for a career. A blank career id yields
    /// nothing and leaves the cell untouched.
    pub async fn fetch(
        &self,
        resource: DashboardResource,
        career_id: &str,
        force_refresh: bool,
    ) -> Option<Payload> {
        let career_id = career_id.trim();
        if career_id.is_empty() {
            return None;
        }
        self.cell(resource).fetch(career_id, force_refresh).await
    }

    pub async fn fetch_global_performance(&self, career_id: &str, force_refresh: bool) -> Option<Payload> {
        self.fetch(DashboardResource::GlobalPerformance, career_id, force_refresh)
            .await
    }

    pub async fn fetch_performance_prediction(&self, career_id: &str, force_refresh: bool) -> Option<Payload> {
        self.fetch(DashboardResource::Prediction, career_id, force_refresh)
            .await
    }

    pub async fn fetch_registration_percentage(&self, career_id: &str, force_refresh: bool) -> Option<Payload> {
        self.fetch(DashboardResource::Registrations, career_id, force_refresh)
            .await
    }

    /// Clear one resource for one career, or, when either is missing, the
    /// whole namespace and every cell.
    pub fn clear_cache(&self, resource: Option<DashboardResource>, career_id: Option<&str>) {
        match (resource, career_id) {
            (Some(resource), Some(career_id)) => self.cell(resource).clear(career_id),
            _ => {
                let removed = self.store.clear_all();
                for resource in DashboardResource::ALL {
                    self.cell(resource).reset();
                }
                info!(removed, "Dashboard cache cleared");
            }
        }
    }

    pub fn is_data_fresh(&self, resource: DashboardResource) -> bool {
        self.cell(resource).is_data_fresh()
    }

    /// Reset every cell and drop the namespace from storage.
    pub fn reset_all(&self) {
        self.clear_cache(None, None);
    }
}

// ============================================================================
// Exam tables
// ============================================================================

pub struct ExamTablesStore {
    store: TtlStore,
    cell: FetchCell<Payload>,
    backend: Arc<dyn ExamTablesBackend>,
    change_counter: AtomicU64,
}

impl ExamTablesStore {
    pub fn new(store: TtlStore, backend: Arc<dyn ExamTablesBackend>) -> Self {
        let loader = ExamTablesLoader {
            backend: backend.clone(),
        };
        Self {
            cell: FetchCell::new(EXAM_TABLES_KIND, store.clone(), Arc::new(loader)),
            store,
            backend,
            change_counter: AtomicU64::new(0),
        }
    }

    pub fn cell(&self) -> &FetchCell<Payload> {
        &self.cell
    }

    pub async fn fetch_exam_tables_grouped(&self, force_refresh: bool) -> Option<Payload> {
        self.cell.fetch("", force_refresh).await
    }

    /// Delete a table remotely, then drop the cache so the next read is
    /// fresh and flag the change for other views.
    pub async fn delete_exam_table(&self, table_id: i64) -> Result<(), FetchError> {
        self.backend.delete(table_id).await?;
        info!(table_id, "Exam table deleted");
        self.clear_cache();
        self.notify_change();
        Ok(())
    }

    pub fn clear_cache(&self) {
        let removed = self.store.clear_all();
        self.cell.reset();
        debug!(removed, "Exam tables cache cleared");
    }

    pub fn is_data_fresh(&self) -> bool {
        self.cell.is_data_fresh()
    }

    pub fn notify_change(&self) {
        self.change_counter.fetch_add(1, Ordering::SeqCst);
    }

    pub fn reset_notification(&self) {
        self.change_counter.store(0, Ordering::SeqCst);
    }

    pub fn has_pending_update(&self) -> bool {
        self.update_version() > 0
    }

    pub fn update_version(&self) -> u64 {
        self.change_counter.load(Ordering::SeqCst)
    }
}

/// Warms the tables cache when the tables view is prefetched.
#[async_trait]
impl TargetResolver for ExamTablesStore {
    async fn resolve(&self, _target: &str) -> anyhow::Result<()> {
        self.fetch_exam_tables_grouped(false).await;
        match self.cell.error() {
            Some(message) => Err(anyhow!(message)),
            None => Ok(()),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
