//! What to prefetch, and when not to.

use super::scheduler::PrefetchTarget;
use crate::auth::Role;

/// Placeholder for the per-person path segment in route patterns.
pub const NAME_PARAM: &str = "[name]";

/// Path fragments that mark a link as leading into a role section.
const ROLE_SECTION_MARKERS: &[&str] = &["admin", "student", "teacher"];

/// Most likely next views per role; offered when navigating inside the
/// role's section. Deliberately short: only the critical few.
fn critical_route_patterns(role: &Role) -> &'static [&'static str] {
    match role {
        Role::Admin => &[
            "/admin/administration-tables",
            "/admin/management-tables",
            "/admin/administration-dashboard",
        ],
        Role::Student => &["/student/[name]/profile", "/student/[name]/ratings"],
        Role::Teacher => &["/teacher/[name]/profile", "/teacher/[name]/tables-assigned"],
        Role::Other(_) => &[],
    }
}

/// Candidates to warm after navigating to `path`.
///
/// Empty unless `path` is inside `role`'s own section. The `[name]` segment
/// is filled with `subject_name` when one is known.
pub fn critical_routes(role: &Role, path: &str, subject_name: Option<&str>) -> Vec<PrefetchTarget> {
    let Some(section) = role.section() else {
        return Vec::new();
    };
    if !path.starts_with(section) {
        return Vec::new();
    }

    critical_route_patterns(role)
        .iter()
        .map(|pattern| match subject_name.filter(|n| !n.is_empty()) {
            Some(name) => pattern.replace(NAME_PARAM, name),
            None => pattern.to_string(),
        })
        .collect()
}

/// Network conditions reported by the host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionInfo {
    /// e.g. `4g`, `3g`, `2g`, `slow-2g`
    pub effective_type: Option<String>,
    pub save_data: bool,
}

impl ConnectionInfo {
    /// Speculative work is skipped on slow or metered connections.
    pub fn is_slow(&self) -> bool {
        self.save_data || matches!(self.effective_type.as_deref(), Some("slow-2g") | Some("2g"))
    }
}

/// A link under the pointer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HoverLink {
    pub host: String,
    pub href: String,
}

impl HoverLink {
    pub fn new(host: impl Into<String>, href: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            href: href.into(),
        }
    }

    /// The link's target, if it is same-origin and points into a role section.
    pub fn prefetch_target(&self, origin_host: &str) -> Option<PrefetchTarget> {
        if self.host != origin_host || self.href.is_empty() {
            return None;
        }
        ROLE_SECTION_MARKERS
            .iter()
            .any(|marker| self.href.contains(marker))
            .then(|| self.href.clone())
    }
}
