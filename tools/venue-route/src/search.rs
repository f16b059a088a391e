//! Path finder - constrained shortest path over a route graph snapshot
//!
//! Labels are compared lexicographically as `(cost, level_changes, hops)`.
//! Among equal labels the predecessor with the smallest node id wins, so a
//! Dijkstra search is fully deterministic for a given snapshot and request.
//!
//! A* uses `geometric distance × COST_SCALE × lower-bound ratio × smallest
//! multiplier` as its heuristic. The ratio is measured over the snapshot's
//! own arcs, so the estimate never exceeds the cost of any edge it replaces.

use std::cmp::Reverse;
use std::time::Instant;

use priority_queue::PriorityQueue;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use utoipa::ToSchema;

use crate::graph::{AccessSetId, EdgeId, NodeId, RouteGraph, COST_SCALE};
use crate::options::Constraints;

/// Settled nodes between two deadline/cancellation checks
pub const CHECK_INTERVAL: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SearchStrategy {
    #[default]
    Dijkstra,
    #[serde(rename = "astar")]
    AStar,
}

/// Deadline and cancellation for one search
#[derive(Debug, Clone, Default)]
pub struct SearchLimits {
    pub deadline: Option<Instant>,
    pub cancel: Option<CancellationToken>,
}

impl SearchLimits {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
            cancel: None,
        }
    }

    fn exceeded(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
            || self.cancel.as_ref().is_some_and(|c| c.is_cancelled())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SearchError {
    #[error("no path between node {origin} and node {target}")]
    NotFound {
        origin: NodeId,
        target: NodeId,
        settled: usize,
    },
    #[error("search stopped after {settled} settled nodes (deadline or cancellation)")]
    Timeout { settled: usize },
}

/// A found path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Path {
    pub nodes: Vec<NodeId>,
    pub edges: Vec<EdgeId>,
    /// Search cost of each edge, parallel to `edges`
    pub edge_costs: Vec<u32>,
    /// Exact sum of `edge_costs`
    pub cost: u64,
    pub level_changes: u32,
    pub settled: usize,
}

impl Path {
    fn single(node: NodeId) -> Self {
        Self {
            nodes: vec![node],
            edges: Vec::new(),
            edge_costs: Vec::new(),
            cost: 0,
            level_changes: 0,
            settled: 0,
        }
    }
}

/// Traversability of every interned access set for one caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessFilter {
    allowed: Vec<bool>,
}

impl AccessFilter {
    /// Evaluate each access set once against the granted restriction ids.
    /// Granted ids the graph does not know are ignored.
    pub fn new<S: AsRef<str>>(graph: &RouteGraph, granted: &[S]) -> Self {
        let mut held = vec![false; graph.restrictions().len()];
        for id in granted {
            if let Some(idx) = graph.restriction_index(id.as_ref()) {
                held[idx as usize] = true;
            }
        }
        let allowed = (0..graph.n_access_sets())
            .map(|set| {
                graph
                    .access_set(set as AccessSetId)
                    .iter()
                    .all(|&r| held[r as usize])
            })
            .collect();
        Self { allowed }
    }

    /// Every restriction granted
    pub fn unrestricted(graph: &RouteGraph) -> Self {
        Self {
            allowed: vec![true; graph.n_access_sets()],
        }
    }

    #[inline]
    pub fn allows(&self, set: AccessSetId) -> bool {
        self.allowed.get(set as usize).copied().unwrap_or(false)
    }
}

type Label = (u64, u32, u32);

const UNREACHED: Label = (u64::MAX, u32::MAX, u32::MAX);

pub struct PathFinder<'a> {
    graph: &'a RouteGraph,
    constraints: &'a Constraints,
    access: &'a AccessFilter,
    strategy: SearchStrategy,
    check_interval: usize,
}

impl<'a> PathFinder<'a> {
    pub fn new(graph: &'a RouteGraph, constraints: &'a Constraints, access: &'a AccessFilter) -> Self {
        Self {
            graph,
            constraints,
            access,
            strategy: SearchStrategy::Dijkstra,
            check_interval: CHECK_INTERVAL,
        }
    }

    pub fn with_strategy(mut self, strategy: SearchStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Settled nodes between two limit checks (at least 1)
    pub fn with_check_interval(mut self, interval: usize) -> Self {
        self.check_interval = interval.max(1);
        self
    }

    fn heuristic(&self, node: NodeId, target: NodeId, scale: f64) -> u64 {
        if scale <= 0.0 {
            return 0;
        }
        (self.graph.geometric_distance(node, target) * scale).floor() as u64
    }

    /// Shortest path from `source` to `target` under the finder's constraints.
    pub fn shortest_path(
        &self,
        source: NodeId,
        target: NodeId,
        limits: &SearchLimits,
    ) -> Result<Path, SearchError> {
        if source == target {
            return Ok(Path::single(source));
        }

        let n = self.graph.n_nodes();
        let astar = self.strategy == SearchStrategy::AStar;
        // Shaved slightly so float error never makes the estimate exceed an edge cost
        let scale = if astar {
            COST_SCALE
                * self.graph.lower_bound_ratio()
                * self.constraints.min_multiplier()
                * (1.0 - 1e-9)
        } else {
            0.0
        };

        let mut labels: Vec<Label> = vec![UNREACHED; n];
        let mut parent: Vec<Option<(NodeId, EdgeId)>> = vec![None; n];
        let mut settled = vec![false; n];
        let mut queue: PriorityQueue<NodeId, Reverse<(u64, u32, u32, NodeId)>> = PriorityQueue::new();

        labels[source as usize] = (0, 0, 0);
        queue.push(
            source,
            Reverse((self.heuristic(source, target, scale), 0, 0, source)),
        );

        let mut n_settled = 0usize;
        while let Some((u, _)) = queue.pop() {
            if n_settled % self.check_interval == 0 && limits.exceeded() {
                tracing::debug!(settled = n_settled, "search limit reached");
                return Err(SearchError::Timeout { settled: n_settled });
            }
            settled[u as usize] = true;
            n_settled += 1;

            if u == target {
                break;
            }

            let (cost_u, lc_u, hops_u) = labels[u as usize];
            let level_u = self.graph.node(u).level;

            for (edge_id, edge) in self.graph.out_edges(u) {
                if self.constraints.is_excluded(edge.way_type) || !self.access.allows(edge.access) {
                    continue;
                }
                let v = edge.to;
                // A* may reopen a settled node; Dijkstra never needs to
                if settled[v as usize] && !astar {
                    continue;
                }

                let level_change = (self.graph.node(v).level != level_u) as u32;
                let candidate: Label = (
                    cost_u + self.constraints.search_cost(edge) as u64,
                    lc_u + level_change,
                    hops_u + 1,
                );
                let current = labels[v as usize];

                if candidate < current {
                    labels[v as usize] = candidate;
                    parent[v as usize] = Some((u, edge_id));
                    settled[v as usize] = false;
                    let f = candidate.0 + self.heuristic(v, target, scale);
                    queue.push(v, Reverse((f, candidate.1, candidate.2, v)));
                } else if candidate == current {
                    if let Some((p, _)) = parent[v as usize] {
                        if u < p {
                            parent[v as usize] = Some((u, edge_id));
                        }
                    }
                }
            }
        }

        if labels[target as usize] == UNREACHED {
            tracing::trace!(source, target, settled = n_settled, "target unreachable");
            return Err(SearchError::NotFound {
                origin: source,
                target,
                settled: n_settled,
            });
        }

        let mut nodes = vec![target];
        let mut edges = Vec::new();
        let mut cursor = target;
        while let Some((prev, edge)) = parent[cursor as usize] {
            edges.push(edge);
            nodes.push(prev);
            cursor = prev;
            if cursor == source {
                break;
            }
        }
        nodes.reverse();
        edges.reverse();

        let edge_costs: Vec<u32> = edges
            .iter()
            .map(|&e| self.constraints.search_cost(self.graph.edge(e)))
            .collect();
        let (cost, level_changes, _) = labels[target as usize];

        tracing::debug!(
            source,
            target,
            cost,
            level_changes,
            settled = n_settled,
            "path found"
        );
        Ok(Path {
            nodes,
            edges,
            edge_costs,
            cost,
            level_changes,
            settled: n_settled,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::tests::walk_node;
    use crate::graph::{EdgeSpec, GraphAssembler, Level};
    use crate::options::{resolve_options, RouteOptions};
    use crate::way_type::{WayTypeId, WayTypeRegistry};
    use std::sync::Arc;
    use std::time::Duration;

    fn level(id: &str, altitude: f64) -> Level {
        Level {
            id: id.into(),
            name: None,
            altitude,
            order: altitude as i32,
        }
    }

    /// Square a-b-d / a-c-d with equal cost on both sides
    fn diamond() -> RouteGraph {
        let mut asm = GraphAssembler::new(Arc::new(WayTypeRegistry::builtin()));
        asm.add_level(level("L0", 0.0));
        let a = asm.add_node(walk_node(0, 0.0, 0.0));
        let b = asm.add_node(walk_node(0, 1.0, 1.0));
        let c = asm.add_node(walk_node(0, 1.0, -1.0));
        let d = asm.add_node(walk_node(0, 2.0, 0.0));
        for (x, y) in [(a, b), (a, c), (b, d), (c, d)] {
            asm.add_bidirectional(EdgeSpec::new(x, y, WayTypeId::WALK, 1414).planar(1.414));
        }
        asm.finish(1, String::new())
    }

    #[test]
    fn test_equal_cost_paths_break_ties_on_predecessor_id() {
        let graph = diamond();
        let constraints = Constraints::unconstrained(graph.way_types());
        let access = AccessFilter::unrestricted(&graph);
        let path = PathFinder::new(&graph, &constraints, &access)
            .shortest_path(0, 3, &SearchLimits::none())
            .unwrap();
        assert_eq!(path.nodes, vec![0, 1, 3]);
        assert_eq!(path.cost, 2828);
        assert_eq!(path.edge_costs.iter().map(|&c| c as u64).sum::<u64>(), path.cost);
    }

    #[test]
    fn test_fewer_level_changes_win_ties() {
        let mut asm = GraphAssembler::new(Arc::new(WayTypeRegistry::builtin()));
        asm.add_level(level("L0", 0.0));
        asm.add_level(level("L1", 4.0));
        let a = asm.add_node(walk_node(0, 0.0, 0.0));
        let up = asm.add_node(walk_node(1, 1.0, 0.0));
        let flat = asm.add_node(walk_node(0, 1.0, 1.0));
        let d = asm.add_node(walk_node(0, 2.0, 0.0));
        // Same total cost; the detour through L1 crosses levels twice
        asm.add_bidirectional(EdgeSpec::new(a, up, WayTypeId::STAIRS, 500));
        asm.add_bidirectional(EdgeSpec::new(up, d, WayTypeId::STAIRS, 500));
        asm.add_bidirectional(EdgeSpec::new(a, flat, WayTypeId::WALK, 500));
        asm.add_bidirectional(EdgeSpec::new(flat, d, WayTypeId::WALK, 500));
        let graph = asm.finish(1, String::new());

        let constraints = Constraints::unconstrained(graph.way_types());
        let access = AccessFilter::unrestricted(&graph);
        let path = PathFinder::new(&graph, &constraints, &access)
            .shortest_path(a, d, &SearchLimits::none())
            .unwrap();
        assert_eq!(path.nodes, vec![a, flat, d]);
        assert_eq!(path.level_changes, 0);
    }

    #[test]
    fn test_access_filter_subset_semantics() {
        let mut asm = GraphAssembler::new(Arc::new(WayTypeRegistry::builtin()));
        asm.add_level(level("L0", 0.0));
        let staff = asm.declare_restriction("staff");
        let vip = asm.declare_restriction("vip");
        let both = asm.intern_access(&[staff, vip]);
        let only_staff = asm.intern_access(&[staff]);
        let graph = asm.finish(1, String::new());

        let filter = AccessFilter::new(&graph, &["staff", "unknown"]);
        assert!(filter.allows(0));
        assert!(filter.allows(only_staff));
        assert!(!filter.allows(both));
        assert!(AccessFilter::new(&graph, &["vip", "staff"]).allows(both));
        assert!(!AccessFilter::new::<&str>(&graph, &[]).allows(only_staff));
    }

    #[test]
    fn test_excluded_way_type_makes_target_unreachable() {
        let mut asm = GraphAssembler::new(Arc::new(WayTypeRegistry::builtin()));
        asm.add_level(level("L0", 0.0));
        asm.add_level(level("L1", 4.0));
        let a = asm.add_node(walk_node(0, 0.0, 0.0));
        let b = asm.add_node(walk_node(1, 0.0, 0.0));
        asm.add_bidirectional(EdgeSpec::new(a, b, WayTypeId::STAIRS, 9000).rise(4.0));
        let graph = asm.finish(1, String::new());

        let constraints = resolve_options(&RouteOptions::avoiding(["stairs"]), graph.way_types()).unwrap();
        let access = AccessFilter::unrestricted(&graph);
        let err = PathFinder::new(&graph, &constraints, &access)
            .shortest_path(a, b, &SearchLimits::none())
            .unwrap_err();
        assert!(matches!(err, SearchError::NotFound { settled: 1, .. }));
    }

    #[test]
    fn test_expired_deadline_times_out() {
        let graph = diamond();
        let constraints = Constraints::unconstrained(graph.way_types());
        let access = AccessFilter::unrestricted(&graph);
        let limits = SearchLimits::with_deadline(Instant::now() - Duration::from_millis(1));
        let err = PathFinder::new(&graph, &constraints, &access)
            .shortest_path(0, 3, &limits)
            .unwrap_err();
        assert_eq!(err, SearchError::Timeout { settled: 0 });
    }

    #[test]
    fn test_cancelled_search_times_out() {
        let graph = diamond();
        let constraints = Constraints::unconstrained(graph.way_types());
        let access = AccessFilter::unrestricted(&graph);
        let token = CancellationToken::new();
        token.cancel();
        let limits = SearchLimits {
            deadline: None,
            cancel: Some(token),
        };
        let err = PathFinder::new(&graph, &constraints, &access)
            .shortest_path(0, 3, &limits)
            .unwrap_err();
        assert!(matches!(err, SearchError::Timeout { .. }));
    }

    #[test]
    fn test_astar_matches_dijkstra_cost() {
        let graph = diamond();
        let constraints = Constraints::unconstrained(graph.way_types());
        let access = AccessFilter::unrestricted(&graph);
        let finder = PathFinder::new(&graph, &constraints, &access);
        let dijkstra = finder.shortest_path(0, 3, &SearchLimits::none()).unwrap();
        let astar = PathFinder::new(&graph, &constraints, &access)
            .with_strategy(SearchStrategy::AStar)
            .shortest_path(0, 3, &SearchLimits::none())
            .unwrap();
        assert_eq!(dijkstra.cost, astar.cost);
        assert!(astar.settled <= dijkstra.settled);
    }

    #[test]
    fn test_same_source_and_target() {
        let graph = diamond();
        let constraints = Constraints::unconstrained(graph.way_types());
        let access = AccessFilter::unrestricted(&graph);
        let path = PathFinder::new(&graph, &constraints, &access)
            .shortest_path(2, 2, &SearchLimits::none())
            .unwrap();
        assert_eq!(path.nodes, vec![2]);
        assert_eq!(path.cost, 0);
        assert!(path.edges.is_empty());
    }
}
