//! Route table of the dashboard views.
//!
//! Resolving a path matches it against the known patterns and, when the
//! matched route has one, runs its warm-up hook (typically a cache fill for
//! the data that view opens with). The table is the prefetch scheduler's
//! target resolver.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use crate::prefetch::TargetResolver;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RouteError {
    #[error("No route matches {0}")]
    NotFound(String),
}

/// Every view of the dashboard. `[param]` segments match any single segment.
pub const KNOWN_ROUTES: &[&str] = &[
    "/",
    "/login",
    "/admin",
    "/admin/administration-tables",
    "/admin/management-tables",
    "/admin/administration-dashboard",
    "/teacher/[name]",
    "/teacher/[name]/profile",
    "/teacher/[name]/tables-assigned",
    "/student/[name]",
    "/student/[name]/profile",
    "/student/[name]/ratings",
];

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Static(String),
    Param(String),
}

struct RouteDef {
    pattern: String,
    segments: Vec<Segment>,
    warmup: Option<Arc<dyn TargetResolver>>,
}

/// A successful match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch {
    pub pattern: String,
    pub params: BTreeMap<String, String>,
}

#[derive(Default)]
pub struct RouteTable {
    routes: Vec<RouteDef>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table holding [`KNOWN_ROUTES`] without warm-up hooks.
    pub fn with_known_routes() -> Self {
        KNOWN_ROUTES
            .iter()
            .fold(Self::new(), |table, pattern| table.route(pattern))
    }

    pub fn route(mut self, pattern: &str) -> Self {
        self.routes.push(RouteDef {
            pattern: pattern.to_string(),
            segments: parse_segments(pattern),
            warmup: None,
        });
        self
    }

    /// Attach a warm-up hook to `pattern`, adding the route if it is new.
    pub fn warm_with(mut self, pattern: &str, warmup: Arc<dyn TargetResolver>) -> Self {
        match self.routes.iter_mut().find(|r| r.pattern == pattern) {
            Some(route) => route.warmup = Some(warmup),
            None => self.routes.push(RouteDef {
                pattern: pattern.to_string(),
                segments: parse_segments(pattern),
                warmup: Some(warmup),
            }),
        }
        self
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn matches(&self, path: &str) -> Result<RouteMatch, RouteError> {
        self.find(path).map(|(_, m)| m)
    }

    fn find(&self, path: &str) -> Result<(&RouteDef, RouteMatch), RouteError> {
        let parts: Vec<&str> = path_segments(path).collect();
        self.routes
            .iter()
            .find_map(|route| {
                match_segments(&route.segments, &parts).map(|params| {
                    (
                        route,
                        RouteMatch {
                            pattern: route.pattern.clone(),
                            params,
                        },
                    )
                })
            })
            .ok_or_else(|| RouteError::NotFound(path.to_string()))
    }
}

#[async_trait]
impl TargetResolver for RouteTable {
    async fn resolve(&self, target: &str) -> anyhow::Result<()> {
        let (route, matched) = self.find(target)?;
        debug!(target, pattern = %matched.pattern, "Route resolved");
        if let Some(ref warmup) = route.warmup {
            warmup.resolve(target).await?;
        }
        Ok(())
    }
}

fn path_segments(path: &str) -> impl Iterator<Item = &str> {
    let end = path.find(['?', '#']).unwrap_or(path.len());
    path[..end].split('/').filter(|s| !s.is_empty())
}

fn parse_segments(pattern: &str) -> Vec<Segment> {
    path_segments(pattern)
        .map(|s| match s.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
            Some(name) => Segment::Param(name.to_string()),
            None => Segment::Static(s.to_string()),
        })
        .collect()
}

fn match_segments(segments: &[Segment], parts: &[&str]) -> Option<BTreeMap<String, String>> {
    if segments.len() != parts.len() {
        return None;
    }
    let mut params = BTreeMap::new();
    for (segment, part) in segments.iter().zip(parts) {
        match segment {
            Segment::Static(s) if s == part => {}
            Segment::Static(_) => return None,
            Segment::Param(name) => {
                params.insert(name.clone(), part.to_string());
            }
        }
    }
    Some(params)
}
