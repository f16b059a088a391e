//! Location resolver - request locations to graph nodes
//!
//! A request names its endpoints as a node id, a space id or a point on a
//! level. Live positions (a phone's indoor fix, a moving shuttle) plug in
//! through [`LocationSource`] and are turned into a point when the request
//! is resolved.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::graph::{NodeId, NodeKind, RouteGraph};
use crate::graph::ramp::planar_distance;
use crate::venue::Position;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Location {
    /// Graph node id (only stable within one graph version)
    Node { id: NodeId },
    /// Space id, resolved to the space's representative node
    Space { id: String },
    /// Planar point on a level
    Point { level: String, x: f64, y: f64 },
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Node { id } => write!(f, "node:{id}"),
            Location::Space { id } => write!(f, "space:{id}"),
            Location::Point { level, x, y } => write!(f, "{level}:{x},{y}"),
        }
    }
}

impl FromStr for Location {
    type Err = LocationError;

    /// `node:12`, `space:lobby` or `L1:10.5,3.0`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let syntax = || LocationError::Syntax(s.to_string());
        let (head, tail) = s.trim().split_once(':').ok_or_else(syntax)?;
        match head {
            "node" => tail
                .trim()
                .parse()
                .map(|id| Location::Node { id })
                .map_err(|_| syntax()),
            "space" if !tail.trim().is_empty() => Ok(Location::Space {
                id: tail.trim().to_string(),
            }),
            level if !level.is_empty() => {
                let (x, y) = tail.split_once(',').ok_or_else(syntax)?;
                let x: f64 = x.trim().parse().map_err(|_| syntax())?;
                let y: f64 = y.trim().parse().map_err(|_| syntax())?;
                if !x.is_finite() || !y.is_finite() {
                    return Err(syntax());
                }
                Ok(Location::Point {
                    level: level.to_string(),
                    x,
                    y,
                })
            }
            _ => Err(syntax()),
        }
    }
}

#[derive(Debug, Error)]
pub enum LocationError {
    #[error("invalid location '{0}': expected node:<id>, space:<id> or <level>:<x>,<y>")]
    Syntax(String),
    #[error("node {0} does not exist")]
    UnknownNode(NodeId),
    #[error(transparent)]
    Unknown(#[from] venue_common::Error),
    #[error("point ({x}, {y}) on level '{level}' is outside every space")]
    OutsideSpaces { level: String, x: f64, y: f64 },
    #[error("space '{0}' has no routable node")]
    NoNode(String),
    #[error("location source '{0}' has no current position")]
    Unavailable(String),
}

/// Point on a named level, as reported by a live position source
#[derive(Debug, Clone, PartialEq)]
pub struct LevelPoint {
    pub level: String,
    pub position: Position,
}

/// Capability of anything that can report where it currently is
pub trait LocationSource: Send + Sync {
    /// Name used in logs and errors
    fn name(&self) -> &str;

    fn current_position(&self) -> Option<LevelPoint>;
}

/// Route endpoint: a fixed location or a live source
#[derive(Clone)]
pub enum RouteEndpoint {
    Fixed(Location),
    Dynamic(Arc<dyn LocationSource>),
}

impl fmt::Debug for RouteEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteEndpoint::Fixed(location) => f.debug_tuple("Fixed").field(location).finish(),
            RouteEndpoint::Dynamic(source) => f.debug_tuple("Dynamic").field(&source.name()).finish(),
        }
    }
}

impl From<Location> for RouteEndpoint {
    fn from(location: Location) -> Self {
        RouteEndpoint::Fixed(location)
    }
}

/// Endpoint bound to a graph node
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedLocation {
    pub node: NodeId,
    pub level: u32,
    /// Where the caller actually is
    pub position: Position,
    /// Planar distance walked between `position` and the node (m)
    pub approach: f64,
}

impl RouteEndpoint {
    pub fn resolve(&self, graph: &RouteGraph) -> Result<ResolvedLocation, LocationError> {
        match self {
            RouteEndpoint::Fixed(location) => location.resolve(graph),
            RouteEndpoint::Dynamic(source) => {
                let point = source
                    .current_position()
                    .ok_or_else(|| LocationError::Unavailable(source.name().to_string()))?;
                Location::Point {
                    level: point.level,
                    x: point.position[0],
                    y: point.position[1],
                }
                .resolve(graph)
            }
        }
    }
}

impl Location {
    pub fn resolve(&self, graph: &RouteGraph) -> Result<ResolvedLocation, LocationError> {
        match self {
            Location::Node { id } => {
                if (*id as usize) >= graph.n_nodes() {
                    return Err(LocationError::UnknownNode(*id));
                }
                Ok(at_node(graph, *id))
            }
            Location::Space { id } => {
                let space = graph.space_index(id).ok_or_else(|| {
                    let known: Vec<&str> = graph.spaces().iter().map(|s| s.id.as_str()).collect();
                    venue_common::Error::unknown_name("space", id, &known)
                })?;
                let node = graph
                    .space(space)
                    .representative
                    .ok_or_else(|| LocationError::NoNode(id.clone()))?;
                Ok(at_node(graph, node))
            }
            Location::Point { level, x, y } => {
                let level_idx = graph.level_index(level).ok_or_else(|| {
                    let known: Vec<&str> = graph.levels().iter().map(|l| l.id.as_str()).collect();
                    venue_common::Error::unknown_name("level", level, &known)
                })?;
                let position = [*x, *y];
                let space = graph.space_at(level_idx, position).ok_or_else(|| {
                    LocationError::OutsideSpaces {
                        level: level.clone(),
                        x: *x,
                        y: *y,
                    }
                })?;

                // Door nodes only as a last resort; their arcs may be restricted
                let in_space = |n: NodeId| graph.node(n).spaces.contains(&space);
                let node = graph
                    .nearest_node(level_idx, position, |n| {
                        in_space(n) && graph.node(n).kind != NodeKind::Door
                    })
                    .or_else(|| graph.nearest_node(level_idx, position, in_space))
                    .ok_or_else(|| LocationError::NoNode(graph.space(space).id.clone()))?;

                Ok(ResolvedLocation {
                    node,
                    level: level_idx,
                    position,
                    approach: planar_distance(position, graph.node(node).position()),
                })
            }
        }
    }
}

fn at_node(graph: &RouteGraph, node: NodeId) -> ResolvedLocation {
    let n = graph.node(node);
    ResolvedLocation {
        node,
        level: n.level,
        position: n.position(),
        approach: 0.0,
    }
}
