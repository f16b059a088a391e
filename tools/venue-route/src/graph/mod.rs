//! Route graph - immutable multi-level routing snapshot
//!
//! Nodes and edges live in flat arenas addressed by `u32` ids. Outgoing arcs
//! of a node are contiguous (CSR layout): `offsets[n]..offsets[n + 1]` indexes
//! into the edge arena. Bidirectional edges are stored as two directed arcs.
//!
//! A [`RouteGraph`] is never mutated once [`GraphAssembler::finish`] returns;
//! rebuilds produce a whole new snapshot.

pub mod builder;
pub mod geometry;
pub mod ramp;
pub mod spatial;

use std::ops::Range;
use std::sync::Arc;

use geo::Polygon;
use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::venue::{ConnectorKind, Position};
use crate::way_type::{WayTypeId, WayTypeRegistry};

use spatial::{NodeIndex, SpaceIndex};

pub type NodeId = u32;
pub type EdgeId = u32;
/// Index into the interned access sets of a graph
pub type AccessSetId = u32;

/// Cost units per metre of equivalent walking
pub const COST_SCALE: f64 = 1000.0;

/// Convert metres of equivalent walking to integer cost units
#[inline]
pub fn cost_units(metres: f64) -> u32 {
    let units = (metres * COST_SCALE).round();
    if units <= 0.0 {
        0
    } else if units >= u32::MAX as f64 {
        u32::MAX
    } else {
        units as u32
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Level {
    pub id: String,
    pub name: Option<String>,
    pub altitude: f64,
    pub order: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    SpaceInterior,
    Door,
    ConnectorEndpoint,
    RampSample,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub level: u32,
    pub x: f64,
    pub y: f64,
    pub altitude: f64,
    pub kind: NodeKind,
    /// Owning spaces; doors own one per side
    pub spaces: Vec<u32>,
    /// Id of the door or connector this node was created for
    pub source: Option<String>,
}

impl Node {
    pub fn position(&self) -> Position {
        [self.x, self.y]
    }
}

/// Directed arc
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub from: NodeId,
    pub to: NodeId,
    pub way_type: WayTypeId,
    /// Planar length (m)
    pub planar: f64,
    /// Signed altitude change from `from` to `to` (m)
    pub rise: f64,
    pub base_cost: u32,
    pub access: AccessSetId,
    /// Index into [`RouteGraph::connectors`]
    pub connector: Option<u32>,
}

impl Edge {
    /// Length in 3D, used for distances in route summaries
    pub fn length(&self) -> f64 {
        (self.planar * self.planar + self.rise * self.rise).sqrt()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpaceRecord {
    pub id: String,
    pub name: Option<String>,
    pub level: u32,
    pub access: AccessSetId,
    /// Interior representative node, when the space has walkable interior
    pub representative: Option<NodeId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConnectorRecord {
    pub id: String,
    pub name: Option<String>,
    pub kind: ConnectorKind,
    pub way_type: WayTypeId,
}

/// Build metadata carried by every snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuildInfo {
    pub version: u64,
    /// SHA-256 of the geometry the snapshot was built from
    pub fingerprint: String,
    pub created_at_utc: String,
    /// Non-fatal problems found while building
    pub warnings: Vec<String>,
}

/// Immutable routing snapshot
#[derive(Debug)]
pub struct RouteGraph {
    levels: Vec<Level>,
    level_by_id: FxHashMap<String, u32>,
    spaces: Vec<SpaceRecord>,
    space_by_id: FxHashMap<String, u32>,
    connectors: Vec<ConnectorRecord>,
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    offsets: Vec<u32>,
    restrictions: Vec<String>,
    restriction_by_id: FxHashMap<String, u32>,
    access_sets: Vec<Vec<u32>>,
    way_types: Arc<WayTypeRegistry>,
    node_index: NodeIndex,
    space_index: SpaceIndex,
    lower_bound_ratio: f64,
    info: BuildInfo,
}

impl RouteGraph {
    pub fn version(&self) -> u64 {
        self.info.version
    }

    pub fn info(&self) -> &BuildInfo {
        &self.info
    }

    pub fn way_types(&self) -> &WayTypeRegistry {
        &self.way_types
    }

    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn n_edges(&self) -> usize {
        self.edges.len()
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id as usize]
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edge(&self, id: EdgeId) -> &Edge {
        &self.edges[id as usize]
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Edge ids of the arcs leaving `node`
    #[inline]
    pub fn out_range(&self, node: NodeId) -> Range<usize> {
        let n = node as usize;
        self.offsets[n] as usize..self.offsets[n + 1] as usize
    }

    pub fn out_edges(&self, node: NodeId) -> impl Iterator<Item = (EdgeId, &Edge)> {
        let range = self.out_range(node);
        let start = range.start;
        self.edges[range]
            .iter()
            .enumerate()
            .map(move |(i, e)| ((start + i) as EdgeId, e))
    }

    pub fn levels(&self) -> &[Level] {
        &self.levels
    }

    pub fn level(&self, idx: u32) -> &Level {
        &self.levels[idx as usize]
    }

    pub fn level_index(&self, id: &str) -> Option<u32> {
        self.level_by_id.get(id).copied()
    }

    pub fn spaces(&self) -> &[SpaceRecord] {
        &self.spaces
    }

    pub fn space(&self, idx: u32) -> &SpaceRecord {
        &self.spaces[idx as usize]
    }

    pub fn space_index(&self, id: &str) -> Option<u32> {
        self.space_by_id.get(id).copied()
    }

    pub fn connectors(&self) -> &[ConnectorRecord] {
        &self.connectors
    }

    pub fn connector(&self, idx: u32) -> &ConnectorRecord {
        &self.connectors[idx as usize]
    }

    /// Known restriction ids, indexed by restriction number
    pub fn restrictions(&self) -> &[String] {
        &self.restrictions
    }

    pub fn restriction_index(&self, id: &str) -> Option<u32> {
        self.restriction_by_id.get(id).copied()
    }

    pub fn n_access_sets(&self) -> usize {
        self.access_sets.len()
    }

    /// Sorted restriction numbers required by an access set
    pub fn access_set(&self, id: AccessSetId) -> &[u32] {
        &self.access_sets[id as usize]
    }

    /// Restriction names required by an access set
    pub fn access_set_names(&self, id: AccessSetId) -> Vec<&str> {
        self.access_set(id)
            .iter()
            .map(|&r| self.restrictions[r as usize].as_str())
            .collect()
    }

    /// Smallest `base_cost / (planar + |Δalt|)` over all arcs, in cost units
    /// per metre divided by [`COST_SCALE`], never above 1.
    pub fn lower_bound_ratio(&self) -> f64 {
        self.lower_bound_ratio
    }

    /// Straight-line planar distance plus absolute altitude difference
    pub fn geometric_distance(&self, a: NodeId, b: NodeId) -> f64 {
        let (na, nb) = (self.node(a), self.node(b));
        ((nb.x - na.x).powi(2) + (nb.y - na.y).powi(2)).sqrt() + (nb.altitude - na.altitude).abs()
    }

    /// Nearest node on a level accepted by `accept`
    pub fn nearest_node<F>(&self, level: u32, pos: Position, accept: F) -> Option<NodeId>
    where
        F: FnMut(NodeId) -> bool,
    {
        self.node_index.nearest(level, pos, accept)
    }

    /// Space containing `pos` on `level`
    pub fn space_at(&self, level: u32, pos: Position) -> Option<u32> {
        self.space_index.space_at(level, pos)
    }}

/// Description of one directed arc for [`GraphAssembler::add_edge`]
#[derive(Debug, Clone)]
pub struct EdgeSpec {
    pub from: NodeId,
    pub to: NodeId,
    pub way_type: WayTypeId,
    pub base_cost: u32,
    pub planar: f64,
    pub rise: f64,
    pub access: AccessSetId,
    pub connector: Option<u32>,
}

impl EdgeSpec {
    pub fn new(from: NodeId, to: NodeId, way_type: WayTypeId, base_cost: u32) -> Self {
        Self {
            from,
            to,
            way_type,
            base_cost,
            planar: 0.0,
            rise: 0.0,
            access: 0,
            connector: None,
        }
    }

    pub fn planar(mut self, planar: f64) -> Self {
        self.planar = planar;
        self
    }

    pub fn rise(mut self, rise: f64) -> Self {
        self.rise = rise;
        self
    }

    pub fn access(mut self, access: AccessSetId) -> Self {
        self.access = access;
        self
    }

    pub fn connector(mut self, connector: u32) -> Self {
        self.connector = Some(connector);
        self
    }

    /// The same arc travelled backwards
    pub fn reversed(&self) -> Self {
        Self {
            from: self.to,
            to: self.from,
            rise: -self.rise,
            ..self.clone()
        }
    }
}

/// Mutable staging area that produces a [`RouteGraph`].
///
/// Access set 0 is always the empty set.
#[derive(Debug)]
pub struct GraphAssembler {
    way_types: Arc<WayTypeRegistry>,
    levels: Vec<Level>,
    level_by_id: FxHashMap<String, u32>,
    spaces: Vec<SpaceRecord>,
    space_polygons: Vec<(u32, Polygon<f64>)>,
    space_by_id: FxHashMap<String, u32>,
    connectors: Vec<ConnectorRecord>,
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    restrictions: Vec<String>,
    restriction_by_id: FxHashMap<String, u32>,
    access_sets: Vec<Vec<u32>>,
    access_by_set: FxHashMap<Vec<u32>, AccessSetId>,
    warnings: Vec<String>,
}

impl GraphAssembler {
    pub fn new(way_types: Arc<WayTypeRegistry>) -> Self {
        let mut access_by_set = FxHashMap::default();
        access_by_set.insert(Vec::new(), 0);
        Self {
            way_types,
            levels: Vec::new(),
            level_by_id: FxHashMap::default(),
            spaces: Vec::new(),
            space_polygons: Vec::new(),
            space_by_id: FxHashMap::default(),
            connectors: Vec::new(),
            nodes: Vec::new(),
            edges: Vec::new(),
            restrictions: Vec::new(),
            restriction_by_id: FxHashMap::default(),
            access_sets: vec![Vec::new()],
            access_by_set,
            warnings: Vec::new(),
        }
    }

    pub fn way_types(&self) -> &WayTypeRegistry {
        &self.way_types
    }

    /// Register a restriction id, returning its number (idempotent)
    pub fn declare_restriction(&mut self, id: &str) -> u32 {
        if let Some(&idx) = self.restriction_by_id.get(id) {
            return idx;
        }
        let idx = self.restrictions.len() as u32;
        self.restrictions.push(id.to_string());
        self.restriction_by_id.insert(id.to_string(), idx);
        idx
    }

    pub fn restriction_index(&self, id: &str) -> Option<u32> {
        self.restriction_by_id.get(id).copied()
    }

    /// Intern a set of restriction numbers
    pub fn intern_access(&mut self, restrictions: &[u32]) -> AccessSetId {
        let mut key = restrictions.to_vec();
        key.sort_unstable();
        key.dedup();
        if let Some(&id) = self.access_by_set.get(&key) {
            return id;
        }
        let id = self.access_sets.len() as AccessSetId;
        self.access_sets.push(key.clone());
        self.access_by_set.insert(key, id);
        id
    }

    /// Union of two interned access sets
    pub fn union_access(&mut self, a: AccessSetId, b: AccessSetId) -> AccessSetId {
        if a == b || b == 0 {
            return a;
        }
        if a == 0 {
            return b;
        }
        let mut merged = self.access_sets[a as usize].clone();
        merged.extend_from_slice(&self.access_sets[b as usize]);
        self.intern_access(&merged)
    }

    pub fn add_level(&mut self, level: Level) -> u32 {
        let idx = self.levels.len() as u32;
        self.level_by_id.insert(level.id.clone(), idx);
        self.levels.push(level);
        idx
    }

    pub fn level(&self, idx: u32) -> &Level {
        &self.levels[idx as usize]
    }

    pub fn add_space(&mut self, record: SpaceRecord, polygon: Polygon<f64>) -> u32 {
        let idx = self.spaces.len() as u32;
        self.space_by_id.insert(record.id.clone(), idx);
        self.space_polygons.push((record.level, polygon));
        self.spaces.push(record);
        idx
    }

    pub fn set_representative(&mut self, space: u32, node: NodeId) {
        self.spaces[space as usize].representative = Some(node);
    }

    pub fn space(&self, idx: u32) -> &SpaceRecord {
        &self.spaces[idx as usize]
    }

    pub fn add_connector(&mut self, record: ConnectorRecord) -> u32 {
        let idx = self.connectors.len() as u32;
        self.connectors.push(record);
        idx
    }

    pub fn add_node(&mut self, node: Node) -> NodeId {
        let id = self.nodes.len() as NodeId;
        self.nodes.push(node);
        id
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id as usize]
    }

    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn add_edge(&mut self, spec: EdgeSpec) {
        self.edges.push(Edge {
            from: spec.from,
            to: spec.to,
            way_type: spec.way_type,
            planar: spec.planar,
            rise: spec.rise,
            base_cost: spec.base_cost,
            access: spec.access,
            connector: spec.connector,
        });
    }

    /// Add the arc and its reverse
    pub fn add_bidirectional(&mut self, spec: EdgeSpec) {
        let reverse = spec.reversed();
        self.add_edge(spec);
        self.add_edge(reverse);
    }

    pub fn warn(&mut self, message: String) {
        self.warnings.push(message);
    }

    /// Sort arcs, build the CSR offsets and spatial indexes, and freeze.
    pub fn finish(mut self, version: u64, fingerprint: String) -> RouteGraph {
        self.edges.sort_by(|a, b| {
            (a.from, a.to, a.way_type, a.base_cost, a.connector)
                .cmp(&(b.from, b.to, b.way_type, b.base_cost, b.connector))
                .then(a.access.cmp(&b.access))
        });

        let n = self.nodes.len();
        let mut offsets = vec![0u32; n + 1];
        for edge in &self.edges {
            offsets[edge.from as usize + 1] += 1;
        }
        for i in 0..n {
            offsets[i + 1] += offsets[i];
        }

        let lower_bound_ratio = self
            .edges
            .iter()
            .filter_map(|e| {
                let (a, b) = (&self.nodes[e.from as usize], &self.nodes[e.to as usize]);
                let geometric = ((b.x - a.x).powi(2) + (b.y - a.y).powi(2)).sqrt()
                    + (b.altitude - a.altitude).abs();
                (geometric > 1e-9).then(|| e.base_cost as f64 / (geometric * COST_SCALE))
            })
            .fold(1.0_f64, f64::min);

        let n_levels = self.levels.len();
        let node_index = NodeIndex::build(n_levels, self.nodes.iter().map(|n| (n.level, n.position())));
        let space_index = SpaceIndex::build(n_levels, self.space_polygons);

        RouteGraph {
            levels: self.levels,
            level_by_id: self.level_by_id,
            spaces: self.spaces,
            space_by_id: self.space_by_id,
            connectors: self.connectors,
            nodes: self.nodes,
            edges: self.edges,
            offsets,
            restrictions: self.restrictions,
            restriction_by_id: self.restriction_by_id,
            access_sets: self.access_sets,
            way_types: self.way_types,
            node_index,
            space_index,
            lower_bound_ratio,
            info: BuildInfo {
                version,
                fingerprint,
                created_at_utc: chrono::Utc::now().to_rfc3339(),
                warnings: self.warnings,
            },
        }
    }
}
