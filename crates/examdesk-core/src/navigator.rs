//! Navigation entry point for the host.
//!
//! Runs the guard on every navigation and, once a navigation is admitted,
//! offers the role's next likely views to the prefetch scheduler.

use tracing::debug;

use crate::auth::{Admission, CredentialStore, RouteGuard};
use crate::prefetch::{critical_routes, ConnectionInfo, HoverLink, PrefetchScheduler};

pub struct Navigator {
    guard: RouteGuard,
    credentials: CredentialStore,
    scheduler: PrefetchScheduler,
    connection: ConnectionInfo,
    origin_host: String,
}

impl Navigator {
    pub fn new(
        credentials: CredentialStore,
        scheduler: PrefetchScheduler,
        origin_host: impl Into<String>,
    ) -> Self {
        Self {
            guard: RouteGuard::new(credentials.clone()),
            credentials,
            scheduler,
            connection: ConnectionInfo::default(),
            origin_host: origin_host.into(),
        }
    }

    pub fn set_connection(&mut self, connection: ConnectionInfo) {
        self.connection = connection;
    }

    pub fn scheduler(&self) -> &PrefetchScheduler {
        &self.scheduler
    }

    /// Admission for `target`; admitted navigations queue a prefetch of the
    /// caller's critical views unless the connection is slow.
    pub fn navigate(&self, target: &str) -> Admission {
        let admission = self.guard.check(target);
        if admission == Admission::Allow {
            self.offer_critical_routes(target);
        }
        admission
    }

    /// Prefetch a hovered link if it leads into a role section.
    pub fn offer_hover(&self, link: &HoverLink) -> bool {
        if self.connection.is_slow() {
            return false;
        }
        match link.prefetch_target(&self.origin_host) {
            Some(target) => self.scheduler.schedule([target]),
            None => false,
        }
    }

    fn offer_critical_routes(&self, target: &str) {
        if self.connection.is_slow() {
            debug!(target, "Slow connection, skipping prefetch");
            return;
        }
        let Some(claims) = self.credentials.claims() else {
            return;
        };
        let name = claims.subject_name();
        let routes = critical_routes(&claims.role(), target, Some(&name));
        if !routes.is_empty() {
            self.scheduler.schedule(routes);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::json;

    use crate::auth::claims::encode_test_token;
    use crate::cache::MemoryStorage;
    use crate::prefetch::{IdleScheduler, IdleTask, TargetResolver};

    struct Immediate;

    impl IdleScheduler for Immediate {
        fn run_when_idle(&self, task: IdleTask) {
            tokio::spawn(task);
        }
    }

    #[derive(Default)]
    struct Recorder(Mutex<Vec<String>>);

    #[async_trait]
    impl TargetResolver for Recorder {
        async fn resolve(&self, target: &str) -> anyhow::Result<()> {
            self.0.lock().push(target.to_string());
            Ok(())
        }
    }

    fn navigator(token: Option<serde_json::Value>) -> (Navigator, Arc<Recorder>) {
        let credentials = CredentialStore::new(Arc::new(MemoryStorage::new()));
        if let Some(payload) = token {
            credentials.store(&encode_test_token(&payload)).unwrap();
        }
        let recorder = Arc::new(Recorder::default());
        let scheduler = PrefetchScheduler::new(recorder.clone(), Arc::new(Immediate), 3);
        (Navigator::new(credentials, scheduler, "localhost"), recorder)
    }

    #[tokio::test]
    async fn test_admin_navigation_prefetches_admin_views() {
        let (nav, recorder) = navigator(Some(json!({"sub": "root", "role": "admin"})));

        assert_eq!(nav.navigate("/admin"), Admission::Allow);
        nav.scheduler().wait_until_settled().await;

        assert_eq!(
            *recorder.0.lock(),
            vec![
                "/admin/administration-tables",
                "/admin/management-tables",
                "/admin/administration-dashboard",
            ]
        );
    }

    #[tokio::test]
    async fn test_student_routes_use_subject_name() {
        let (nav, recorder) =
            navigator(Some(json!({"sub": "leo", "role": "student", "name": "Leo"})));

        nav.navigate("/student/Leo");
        nav.scheduler().wait_until_settled().await;

        assert_eq!(
            *recorder.0.lock(),
            vec!["/student/Leo/profile", "/student/Leo/ratings"]
        );
    }

    #[tokio::test]
    async fn test_redirected_navigation_prefetches_nothing() {
        let (nav, recorder) = navigator(None);

        assert_eq!(nav.navigate("/admin"), Admission::RedirectLogin);
        nav.scheduler().wait_until_settled().await;
        assert!(recorder.0.lock().is_empty());
    }

    #[tokio::test]
    async fn test_slow_connection_skips_prefetch() {
        let (mut nav, recorder) = navigator(Some(json!({"sub": "root", "role": "admin"})));
        nav.set_connection(ConnectionInfo {
            effective_type: Some("slow-2g".into()),
            save_data: false,
        });

        assert_eq!(nav.navigate("/admin"), Admission::Allow);
        assert!(!nav.offer_hover(&HoverLink::new("localhost", "/admin/management-tables")));
        nav.scheduler().wait_until_settled().await;
        assert!(recorder.0.lock().is_empty());
    }

    #[tokio::test]
    async fn test_hover_prefetches_same_origin_role_links() {
        let (nav, recorder) = navigator(Some(json!({"sub": "root", "role": "admin"})));

        assert!(nav.offer_hover(&HoverLink::new("localhost", "/admin/management-tables")));
        nav.scheduler().wait_until_settled().await;
        // Already warmed
        assert!(!nav.offer_hover(&HoverLink::new("localhost", "/admin/management-tables")));
        assert!(!nav.offer_hover(&HoverLink::new("other.host", "/admin")));

        assert_eq!(*recorder.0.lock(), vec!["/admin/management-tables"]);
    }
}
