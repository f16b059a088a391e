//! Router facade - one route request against one graph snapshot

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};
use utoipa::ToSchema;

use crate::describe::{describe, DescribeConfig, Instruction, RouteSummary};
use crate::graph::RouteGraph;
use crate::location::RouteEndpoint;
use crate::options::{resolve_options, RouteOptions};
use crate::search::{
    AccessFilter, Path, PathFinder, SearchError, SearchLimits, SearchStrategy, CHECK_INTERVAL,
};

/// Search and description settings shared by every request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterSettings {
    pub strategy: SearchStrategy,
    /// Settled nodes between deadline/cancellation checks
    pub check_interval: usize,
    /// Re-run failed searches without restrictions to classify the failure
    pub diagnose_not_found: bool,
    /// Applied when a request carries no deadline (ms)
    pub default_timeout_ms: Option<u64>,
    pub describe: DescribeConfig,
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self {
            strategy: SearchStrategy::Dijkstra,
            check_interval: CHECK_INTERVAL,
            diagnose_not_found: true,
            default_timeout_ms: Some(2_000),
            describe: DescribeConfig::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RouteRequest {
    pub origin: RouteEndpoint,
    pub destination: RouteEndpoint,
    /// Restriction ids granted to the caller
    pub access: Vec<String>,
    pub options: RouteOptions,
    pub limits: SearchLimits,
}

impl RouteRequest {
    pub fn new(origin: impl Into<RouteEndpoint>, destination: impl Into<RouteEndpoint>) -> Self {
        Self {
            origin: origin.into(),
            destination: destination.into(),
            access: Vec::new(),
            options: RouteOptions::default(),
            limits: SearchLimits::none(),
        }
    }

    pub fn with_access<I, S>(mut self, access: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.access = access.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_options(mut self, options: RouteOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_limits(mut self, limits: SearchLimits) -> Self {
        self.limits = limits;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Waypoint {
    pub level: String,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Route {
    /// Snapshot the route was computed on
    pub graph_version: u64,
    pub waypoints: Vec<Waypoint>,
    pub instructions: Vec<Instruction>,
    pub summary: RouteSummary,
    #[serde(skip)]
    pub path: Path,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum NotFoundReason {
    /// A path exists for a caller holding every restriction
    Restricted,
    Disconnected,
    /// Diagnosis disabled
    Unknown,
    Timeout,
}

impl NotFoundReason {
    pub fn name(&self) -> &'static str {
        match self {
            NotFoundReason::Restricted => "restricted",
            NotFoundReason::Disconnected => "disconnected",
            NotFoundReason::Unknown => "unknown",
            NotFoundReason::Timeout => "timeout",
        }
    }
}

#[derive(Debug, Error)]
pub enum RouteError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("no route found ({})", .reason.name())]
    NotFound { reason: NotFoundReason },
}

/// Find a route on `graph`.
///
/// Both endpoints and the options are resolved before any search runs, so an
/// invalid request never costs a search.
pub fn find_route(
    graph: &RouteGraph,
    request: &RouteRequest,
    settings: &RouterSettings,
) -> Result<Route, RouteError> {
    let origin = request
        .origin
        .resolve(graph)
        .map_err(|e| RouteError::InvalidRequest(format!("origin: {e}")))?;
    let destination = request
        .destination
        .resolve(graph)
        .map_err(|e| RouteError::InvalidRequest(format!("destination: {e}")))?;
    let constraints = resolve_options(&request.options, graph.way_types())
        .map_err(|e| RouteError::InvalidRequest(e.to_string()))?;

    let mut limits = request.limits.clone();
    if limits.deadline.is_none() {
        limits.deadline = settings
            .default_timeout_ms
            .map(|ms| Instant::now() + Duration::from_millis(ms));
    }

    let access = AccessFilter::new(graph, &request.access);
    let finder = PathFinder::new(graph, &constraints, &access)
        .with_strategy(settings.strategy)
        .with_check_interval(settings.check_interval);

    let path = match finder.shortest_path(origin.node, destination.node, &limits) {
        Ok(path) => path,
        Err(SearchError::Timeout { settled }) => {
            warn!(
                timeout = true,
                settled,
                graph_version = graph.version(),
                "route search stopped before completion"
            );
            return Err(RouteError::NotFound {
                reason: NotFoundReason::Timeout,
            });
        }
        Err(SearchError::NotFound { .. }) => {
            let reason = if settings.diagnose_not_found {
                let everyone = AccessFilter::unrestricted(graph);
                let lifted = PathFinder::new(graph, &constraints, &everyone)
                    .with_strategy(settings.strategy)
                    .with_check_interval(settings.check_interval);
                match lifted.shortest_path(origin.node, destination.node, &limits) {
                    Ok(_) => NotFoundReason::Restricted,
                    Err(SearchError::NotFound { .. }) => NotFoundReason::Disconnected,
                    Err(SearchError::Timeout { .. }) => NotFoundReason::Unknown,
                }
            } else {
                NotFoundReason::Unknown
            };
            debug!(reason = reason.name(), "no route");
            return Err(RouteError::NotFound { reason });
        }
    };

    let (instructions, summary) = describe(graph, &path, &origin, &destination, &settings.describe);

    let mut waypoints: Vec<Waypoint> = Vec::with_capacity(path.nodes.len() + 2);
    let mut push = |level: u32, [x, y]: [f64; 2]| {
        let level = graph.level(level).id.clone();
        if waypoints
            .last()
            .is_some_and(|w| w.level == level && w.x == x && w.y == y)
        {
            return;
        }
        waypoints.push(Waypoint { level, x, y });
    };
    push(origin.level, origin.position);
    for &node in &path.nodes {
        let n = graph.node(node);
        push(n.level, n.position());
    }
    push(destination.level, destination.position);

    Ok(Route {
        graph_version: graph.version(),
        waypoints,
        instructions,
        summary,
        path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::builder::{BuildConfig, GraphBuilder};
    use crate::location::Location;
    use crate::venue::VenueGeometry;
    use crate::way_type::WayTypeRegistry;
    use std::sync::Arc;

    // Two rooms joined by a staff-only door, and a closet reachable from nowhere
    const VENUE: &str = r#"{
        "restrictions": ["staff"],
        "levels": [ { "id": "L0", "altitude": 0.0 } ],
        "spaces": [
            { "id": "office", "level": "L0", "polygon": [[0,0],[10,0],[10,10],[0,10]] },
            { "id": "store", "level": "L0", "polygon": [[10,0],[20,0],[20,10],[10,10]] },
            { "id": "closet", "level": "L0", "polygon": [[40,0],[44,0],[44,4],[40,4]] }
        ],
        "doors": [
            { "id": "d1", "level": "L0", "segment": [[10,4],[10,6]], "access_restriction": "staff" }
        ]
    }"#;

    fn graph() -> RouteGraph {
        let venue = VenueGeometry::from_json_str(VENUE).unwrap();
        GraphBuilder::new(Arc::new(WayTypeRegistry::builtin()), BuildConfig::default())
            .build(&venue, 3)
            .unwrap()
    }

    fn space(id: &str) -> Location {
        Location::Space { id: id.into() }
    }

    #[test]
    fn test_route_with_granted_restriction() {
        let graph = graph();
        let request = RouteRequest::new(space("office"), space("store")).with_access(["staff"]);
        let route = find_route(&graph, &request, &RouterSettings::default()).unwrap();
        assert_eq!(route.graph_version, 3);
        assert_eq!(route.waypoints.first().unwrap().x, 5.0);
        assert_eq!(route.waypoints.last().unwrap().x, 15.0);
        assert_eq!(route.path.cost, route.path.edge_costs.iter().map(|&c| c as u64).sum::<u64>());
        assert_eq!(route.instructions.first().unwrap().icon, "depart");
        assert_eq!(route.instructions.last().unwrap().icon, "arrive");
    }

    #[test]
    fn test_not_found_is_classified() {
        let graph = graph();
        let settings = RouterSettings::default();

        let request = RouteRequest::new(space("office"), space("store"));
        match find_route(&graph, &request, &settings) {
            Err(RouteError::NotFound { reason }) => assert_eq!(reason, NotFoundReason::Restricted),
            other => panic!("expected restricted, got {other:?}"),
        }

        let request = RouteRequest::new(space("office"), space("closet")).with_access(["staff"]);
        match find_route(&graph, &request, &settings) {
            Err(RouteError::NotFound { reason }) => assert_eq!(reason, NotFoundReason::Disconnected),
            other => panic!("expected disconnected, got {other:?}"),
        }

        let quiet = RouterSettings {
            diagnose_not_found: false,
            ..RouterSettings::default()
        };
        let request = RouteRequest::new(space("office"), space("store"));
        match find_route(&graph, &request, &quiet) {
            Err(RouteError::NotFound { reason }) => assert_eq!(reason, NotFoundReason::Unknown),
            other => panic!("expected unknown, got {other:?}"),
        }
    }

    #[test]
    fn test_invalid_requests_are_rejected_before_search() {
        let graph = graph();
        let settings = RouterSettings::default();

        let request = RouteRequest::new(space("ofice"), space("store"));
        let err = find_route(&graph, &request, &settings).unwrap_err();
        assert!(matches!(err, RouteError::InvalidRequest(_)));
        assert!(err.to_string().contains("origin"));

        let request = RouteRequest::new(space("office"), space("store"))
            .with_options(RouteOptions::avoiding(["stiars"]));
        let err = find_route(&graph, &request, &settings).unwrap_err();
        assert!(err.to_string().contains("did you mean 'stairs'"), "{err}");
    }

    #[test]
    fn test_same_origin_and_destination() {
        let graph = graph();
        let request = RouteRequest::new(space("office"), space("office"));
        let route = find_route(&graph, &request, &RouterSettings::default()).unwrap();
        assert_eq!(route.summary.distance, 0.0);
        assert_eq!(route.instructions.len(), 1);
        assert_eq!(route.instructions[0].icon, "arrive");
        assert_eq!(route.waypoints.len(), 1);
    }

    #[test]
    fn test_expired_deadline_reports_timeout() {
        let graph = graph();
        let request = RouteRequest::new(space("office"), space("store"))
            .with_access(["staff"])
            .with_limits(SearchLimits::with_deadline(Instant::now()));
        match find_route(&graph, &request, &RouterSettings::default()) {
            Err(RouteError::NotFound { reason }) => assert_eq!(reason, NotFoundReason::Timeout),
            other => panic!("expected timeout, got {other:?}"),
        }
    }
}
