//! Graph builder - venue geometry to a routable snapshot
//!
//! Construction runs in three phases:
//!
//! 1. **Validation**: every problem in the input is collected (duplicate ids,
//!    dangling level or restriction references, malformed rings, short
//!    connectors). Any problem aborts the build with [`BuildError`].
//! 2. **Sampling**: each space gets a visibility-graph node set (interior
//!    representative point, inset reflex corners, outset corners of holes and
//!    obstacles). Doors and connector points become portal nodes attached to
//!    the spaces around them.
//! 3. **Linking**: mutually visible nodes of a space are joined by walk edges,
//!    connectors add their stair/escalator/elevator/ramp arcs, and the
//!    [`GraphAssembler`] freezes everything into a [`RouteGraph`].
//!
//! Spaces are independent during sampling and linking, so both phases run on
//! the rayon pool. Node ids are assigned sequentially afterwards to keep the
//! output deterministic.

use std::sync::Arc;
use std::time::Instant;

use geo::{Intersects, Polygon};
use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::venue::{
    ConnectorDef, ConnectorKind, HasAccessRestriction, HasLevel, ObstacleDef, Position, SpaceDef,
    VenueGeometry,
};
use crate::way_type::{WayTypeId, WayTypeRegistry};

use super::geometry::{self, SpaceShape};
use super::ramp::{planar_distance, RampPath};
use super::spatial::SpaceIndex;
use super::{
    cost_units, AccessSetId, ConnectorRecord, EdgeSpec, GraphAssembler, Level, Node, NodeId,
    NodeKind, RouteGraph, SpaceRecord,
};

/// Geometry sampling parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Distance corner samples are pushed away from walls and obstacles (m)
    pub wall_offset: f64,
    /// Distance probed on each side of a door to find its spaces (m)
    pub door_probe: f64,
    /// Maximum spacing of ramp samples between altitude markers (m)
    pub ramp_step: f64,
    /// Longest straight walk edge; unlimited when absent
    pub max_edge_length: Option<f64>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            wall_offset: 0.3,
            door_probe: 0.5,
            ramp_step: 2.0,
            max_edge_length: None,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum BuildError {
    #[error("invalid geometry: {}", .problems.join("; "))]
    InvalidGeometry { problems: Vec<String> },
}

impl BuildError {
    pub fn problems(&self) -> &[String] {
        match self {
            BuildError::InvalidGeometry { problems } => problems,
        }
    }
}

pub struct GraphBuilder {
    registry: Arc<WayTypeRegistry>,
    config: BuildConfig,
}

/// Per-space output of the sampling phase
struct SpaceSamples {
    shape: SpaceShape,
    interior: Vec<Position>,
}

impl GraphBuilder {
    pub fn new(registry: Arc<WayTypeRegistry>, config: BuildConfig) -> Self {
        Self { registry, config }
    }

    /// Build a snapshot tagged with `version`.
    pub fn build(&self, venue: &VenueGeometry, version: u64) -> Result<RouteGraph, BuildError> {
        let started = Instant::now();
        info!(
            version,
            levels = venue.levels.len(),
            spaces = venue.spaces.len(),
            doors = venue.doors.len(),
            connectors = venue.connectors.len(),
            "building route graph"
        );

        let problems = validate(venue, &self.registry);
        if !problems.is_empty() {
            return Err(BuildError::InvalidGeometry { problems });
        }

        let mut problems = Vec::new();
        let mut asm = GraphAssembler::new(Arc::clone(&self.registry));
        for restriction in &venue.restrictions {
            asm.declare_restriction(restriction);
        }

        let mut level_idx: FxHashMap<&str, u32> = FxHashMap::default();
        for level in &venue.levels {
            let idx = asm.add_level(Level {
                id: level.id.clone(),
                name: level.name.clone(),
                altitude: level.altitude,
                order: level.order,
            });
            level_idx.insert(level.id.as_str(), idx);
        }

        // Sampling, one task per space
        let samples: Vec<SpaceSamples> = venue
            .spaces
            .par_iter()
            .map(|space| self.sample_space(space, &venue.obstacles))
            .collect();

        let index = SpaceIndex::build(
            venue.levels.len(),
            venue
                .spaces
                .iter()
                .zip(&samples)
                .map(|(space, s)| (level_idx[space.level.as_str()], s.shape.polygon.clone()))
                .collect(),
        );

        let mut space_access = Vec::with_capacity(venue.spaces.len());
        let mut space_nodes: Vec<Vec<NodeId>> = Vec::with_capacity(venue.spaces.len());
        for (space, sampled) in venue.spaces.iter().zip(&samples) {
            let level = level_idx[space.level.as_str()];
            let altitude = asm.level(level).altitude;
            let access = access_of(&mut asm, space);
            let idx = asm.add_space(
                SpaceRecord {
                    id: space.id.clone(),
                    name: space.name.clone(),
                    level,
                    access,
                    representative: None,
                },
                sampled.shape.polygon.clone(),
            );
            space_access.push(access);

            if sampled.interior.is_empty() {
                let message = format!("space '{}' has no walkable interior", space.id);
                warn!(space = %space.id, "space has no walkable interior");
                asm.warn(message);
            }

            let ids: Vec<NodeId> = sampled
                .interior
                .iter()
                .map(|&[x, y]| {
                    asm.add_node(Node {
                        level,
                        x,
                        y,
                        altitude,
                        kind: NodeKind::SpaceInterior,
                        spaces: vec![idx],
                        source: None,
                    })
                })
                .collect();
            if let Some(&first) = ids.first() {
                asm.set_representative(idx, first);
            }
            space_nodes.push(ids);
        }

        let mut portals: Vec<Vec<NodeId>> = vec![Vec::new(); venue.spaces.len()];
        let mut door_access: FxHashMap<NodeId, AccessSetId> = FxHashMap::default();

        for door in &venue.doors {
            let level = level_idx[door.level.as_str()];
            let [a, b] = door.segment;
            let mid = [(a[0] + b[0]) / 2.0, (a[1] + b[1]) / 2.0];
            let len = planar_distance(a, b);
            let normal = [-(b[1] - a[1]) / len, (b[0] - a[0]) / len];

            let mut sides: Vec<u32> = Vec::with_capacity(2);
            for sign in [1.0, -1.0] {
                let probe = [
                    mid[0] + normal[0] * self.config.door_probe * sign,
                    mid[1] + normal[1] * self.config.door_probe * sign,
                ];
                if let Some(space) = index.space_at(level, probe) {
                    if !sides.contains(&space) {
                        sides.push(space);
                    }
                }
            }
            if sides.is_empty() {
                problems.push(format!("door '{}' touches no space", door.id));
                continue;
            }

            let altitude = asm.level(level).altitude;
            let node = asm.add_node(Node {
                level,
                x: mid[0],
                y: mid[1],
                altitude,
                kind: NodeKind::Door,
                spaces: sides.clone(),
                source: Some(door.id.clone()),
            });
            let access = access_of(&mut asm, door);
            if access != 0 {
                door_access.insert(node, access);
            }
            for space in sides {
                portals[space as usize].push(node);
            }
        }

        for connector in &venue.connectors {
            self.add_connector(
                &mut asm,
                connector,
                &level_idx,
                &index,
                &mut portals,
                &mut problems,
            );
        }

        if !problems.is_empty() {
            return Err(BuildError::InvalidGeometry { problems });
        }

        // Linking, one task per space
        let positions: Vec<Position> = (0..asm.n_nodes())
            .map(|id| asm.node(id as NodeId).position())
            .collect();
        let max_len = self.config.max_edge_length;
        let links: Vec<Vec<(NodeId, NodeId, f64)>> = samples
            .par_iter()
            .zip(space_nodes.par_iter().zip(portals.par_iter()))
            .map(|(sampled, (interior, space_portals))| {
                link_space(&sampled.shape, interior, space_portals, &positions, max_len)
            })
            .collect();

        for (space, pairs) in links.into_iter().enumerate() {
            let unlinked: Vec<NodeId> = portals[space]
                .iter()
                .copied()
                .filter(|&p| !pairs.iter().any(|&(a, b, _)| a == p || b == p))
                .collect();

            for (a, b, planar) in pairs {
                self.add_walk_edge(&mut asm, a, b, planar, space_access[space], &door_access);
            }

            // A portal nobody sees still gets its nearest neighbour in the space
            for portal in unlinked {
                let here = positions[portal as usize];
                let nearest = space_nodes[space]
                    .iter()
                    .chain(&portals[space])
                    .copied()
                    .filter(|&n| n != portal)
                    .min_by(|&x, &y| {
                        planar_distance(here, positions[x as usize])
                            .total_cmp(&planar_distance(here, positions[y as usize]))
                            .then(x.cmp(&y))
                    });
                if let Some(target) = nearest {
                    let planar = planar_distance(here, positions[target as usize]);
                    let message = format!(
                        "node {portal} sees nothing in space '{}'; linked to nearest node {target}",
                        venue.spaces[space].id
                    );
                    debug!(portal, target, "linking blind portal to nearest node");
                    asm.warn(message);
                    self.add_walk_edge(&mut asm, portal, target, planar, space_access[space], &door_access);
                }
            }
        }

        let graph = asm.finish(version, venue.fingerprint());
        info!(
            version,
            nodes = graph.n_nodes(),
            edges = graph.n_edges(),
            warnings = graph.info().warnings.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "route graph built"
        );
        Ok(graph)
    }

    fn sample_space(&self, space: &SpaceDef, obstacles: &[ObstacleDef]) -> SpaceSamples {
        let exterior = geometry::open_ring(&space.polygon);
        let holes: Vec<Vec<Position>> = space.holes.iter().map(|h| geometry::open_ring(h)).collect();
        let polygon = geometry::to_polygon(&exterior, &holes);

        let mut barriers = geometry::ring_edges(&exterior);
        for hole in &holes {
            barriers.extend(geometry::ring_edges(hole));
        }

        let offset = self.config.wall_offset;
        let mut corners = geometry::offset_corners(&exterior, offset, false);
        for hole in &holes {
            corners.extend(geometry::offset_corners(hole, offset, true));
        }

        let mut blocking: Vec<Polygon<f64>> = Vec::new();
        for obstacle in obstacles.iter().filter(|o| o.level == space.level) {
            if !obstacle.polygon.is_empty() {
                let ring = geometry::open_ring(&obstacle.polygon);
                let area = geometry::to_polygon(&ring, &[]);
                if polygon.intersects(&area) {
                    barriers.extend(geometry::ring_edges(&ring));
                    corners.extend(geometry::offset_corners(&ring, offset, true));
                    blocking.push(area);
                }
            }
            if obstacle.line.len() >= 2
                && polygon.intersects(&geometry::ring_to_linestring(&obstacle.line))
            {
                barriers.extend(geometry::polyline_edges(&obstacle.line));
                corners.extend(line_end_samples(&obstacle.line, offset));
            }
        }

        let shape = SpaceShape {
            polygon,
            obstacles: blocking,
            barriers,
        };

        let mut interior = Vec::new();
        if let Some(rep) = shape.representative_point(&corners) {
            interior.push(rep);
            for corner in corners {
                let duplicate = interior
                    .iter()
                    .any(|&p| planar_distance(p, corner) < 1e-6);
                if !duplicate && shape.is_walkable(corner) {
                    interior.push(corner);
                }
            }
        }

        SpaceSamples { shape, interior }
    }

    fn add_walk_edge(
        &self,
        asm: &mut GraphAssembler,
        a: NodeId,
        b: NodeId,
        planar: f64,
        space_access: AccessSetId,
        door_access: &FxHashMap<NodeId, AccessSetId>,
    ) {
        let mut access = space_access;
        for node in [a, b] {
            if let Some(&door) = door_access.get(&node) {
                access = asm.union_access(access, door);
            }
        }
        let rise = asm.node(b).altitude - asm.node(a).altitude;
        // Faster walking makes the same distance cheaper, matching the time estimate
        let pace = self.registry.get(WayTypeId::WALK).speed_factor;
        asm.add_bidirectional(
            EdgeSpec::new(a, b, WayTypeId::WALK, cost_units(planar / pace))
                .planar(planar)
                .rise(rise)
                .access(access),
        );
    }

    fn add_connector(
        &self,
        asm: &mut GraphAssembler,
        connector: &ConnectorDef,
        level_idx: &FxHashMap<&str, u32>,
        index: &SpaceIndex,
        portals: &mut [Vec<NodeId>],
        problems: &mut Vec<String>,
    ) {
        let way_type = connector
            .way_type
            .as_deref()
            .and_then(|name| self.registry.lookup(name))
            .unwrap_or_else(|| WayTypeRegistry::for_connector(connector.kind));
        let record = asm.add_connector(ConnectorRecord {
            id: connector.id.clone(),
            name: connector.name.clone(),
            kind: connector.kind,
            way_type,
        });
        let access = access_of(asm, connector);

        let last = connector.points.len() - 1;
        let mut endpoints = Vec::with_capacity(connector.points.len());
        let mut complete = true;
        for (k, point) in connector.points.iter().enumerate() {
            let level = level_idx[point.level.as_str()];
            let space = index.space_at(level, point.position);
            let required = connector.kind == ConnectorKind::Elevator || k == 0 || k == last;
            if space.is_none() && required {
                problems.push(format!(
                    "connector '{}' point {k} is outside every space",
                    connector.id
                ));
                complete = false;
            }
            let node = asm.add_node(Node {
                level,
                x: point.position[0],
                y: point.position[1],
                altitude: point.altitude,
                kind: NodeKind::ConnectorEndpoint,
                spaces: space.into_iter().collect(),
                source: Some(connector.id.clone()),
            });
            if let Some(space) = space.filter(|_| required) {
                portals[space as usize].push(node);
            }
            endpoints.push(node);
        }
        if !complete {
            return;
        }

        let edge = |from: NodeId, to: NodeId, planar: f64, rise: f64, metres: f64| {
            EdgeSpec::new(from, to, way_type, cost_units(metres))
                .planar(planar)
                .rise(rise)
                .access(access)
                .connector(record)
        };
        let penalty = self.registry.get(way_type).transition_penalty;

        match connector.kind {
            ConnectorKind::Stairs | ConnectorKind::Escalator => {
                let segments = connector_segments(connector);
                let shares = distribute_length(connector.length, &segments);
                let per_segment_penalty = penalty / segments.len() as f64;
                for (k, (&(planar, rise, _), share)) in segments.iter().zip(shares).enumerate() {
                    let metres = share.max(planar + rise.abs()) + per_segment_penalty;
                    let spec = edge(endpoints[k], endpoints[k + 1], planar, rise, metres);
                    add_arc(asm, spec, connector.one_way);
                }
            }
            ConnectorKind::Elevator => {
                let segments = connector_segments(connector);
                let shares = distribute_length(connector.length, &segments);
                for i in 0..endpoints.len() {
                    for j in (i + 1)..endpoints.len() {
                        let (pi, pj) = (&connector.points[i], &connector.points[j]);
                        let planar = planar_distance(pi.position, pj.position);
                        let rise = pj.altitude - pi.altitude;
                        let shaft: f64 = shares[i..j].iter().sum();
                        let metres = shaft.max(planar + rise.abs()) + penalty;
                        add_arc(asm, edge(endpoints[i], endpoints[j], planar, rise, metres), connector.one_way);
                    }
                }
            }
            ConnectorKind::Ramp => {
                let markers: Vec<(Position, f64)> = connector
                    .points
                    .iter()
                    .map(|p| (p.position, p.altitude))
                    .collect();
                let path = match RampPath::new(&markers) {
                    Ok(path) => path,
                    Err(e) => {
                        problems.push(format!("connector '{}': {e}", connector.id));
                        return;
                    }
                };
                let profile = path.profile();
                let distances = profile.sample_distances(self.config.ramp_step);

                let mut samples = Vec::with_capacity(distances.len());
                let mut next_marker = 0;
                for &d in &distances {
                    if next_marker < endpoints.len() && d == profile.markers()[next_marker].0 {
                        samples.push(endpoints[next_marker]);
                        next_marker += 1;
                        continue;
                    }
                    let pos = path.position_at(d);
                    let level =
                        level_idx[connector.points[path.segment_index(d)].level.as_str()];
                    let node = asm.add_node(Node {
                        level,
                        x: pos[0],
                        y: pos[1],
                        altitude: profile.altitude_at(d),
                        kind: NodeKind::RampSample,
                        spaces: index.space_at(level, pos).into_iter().collect(),
                        source: Some(connector.id.clone()),
                    });
                    samples.push(node);
                }

                let n_segments = (samples.len() - 1) as f64;
                for pair in distances.windows(2).zip(samples.windows(2)) {
                    let ([d0, d1], [from, to]) = (pair.0, pair.1) else {
                        continue;
                    };
                    let planar = planar_distance(path.position_at(*d0), path.position_at(*d1));
                    let rise = profile.rise_between(*d0, *d1);
                    let metres = planar + rise.abs() + penalty / n_segments;
                    add_arc(asm, edge(*from, *to, planar, rise, metres), connector.one_way);
                }
            }
        }
    }
}

/// Walk edges between mutually visible nodes of one space
fn link_space(
    shape: &SpaceShape,
    interior: &[NodeId],
    portals: &[NodeId],
    positions: &[Position],
    max_len: Option<f64>,
) -> Vec<(NodeId, NodeId, f64)> {
    let ids: Vec<NodeId> = interior.iter().chain(portals).copied().collect();
    let mut pairs = Vec::new();
    for (i, &a) in ids.iter().enumerate() {
        for &b in &ids[i + 1..] {
            if a == b {
                continue;
            }
            let (pa, pb) = (positions[a as usize], positions[b as usize]);
            let planar = planar_distance(pa, pb);
            if max_len.is_some_and(|max| planar > max) {
                continue;
            }
            if shape.visible(pa, pb) {
                pairs.push((a, b, planar));
            }
        }
    }
    pairs
}

fn add_arc(asm: &mut GraphAssembler, spec: EdgeSpec, one_way: bool) {
    if one_way {
        asm.add_edge(spec);
    } else {
        asm.add_bidirectional(spec);
    }
}

/// `(planar, rise, length_3d)` per consecutive point pair
fn connector_segments(connector: &ConnectorDef) -> Vec<(f64, f64, f64)> {
    connector
        .points
        .windows(2)
        .map(|w| {
            let planar = planar_distance(w[0].position, w[1].position);
            let rise = w[1].altitude - w[0].altitude;
            (planar, rise, (planar * planar + rise * rise).sqrt())
        })
        .collect()
}

/// Split a declared length over segments in proportion to their 3D length.
/// Without a declaration each segment keeps its own 3D length.
fn distribute_length(declared: Option<f64>, segments: &[(f64, f64, f64)]) -> Vec<f64> {
    let total: f64 = segments.iter().map(|s| s.2).sum();
    match declared {
        None => segments.iter().map(|s| s.2).collect(),
        Some(length) if total > 0.0 => segments.iter().map(|s| length * s.2 / total).collect(),
        Some(length) => vec![length / segments.len() as f64; segments.len()],
    }
}

/// Points just beyond each end of a barrier line
fn line_end_samples(line: &[Position], offset: f64) -> Vec<Position> {
    let mut out = Vec::with_capacity(2);
    for (end, inner) in [(line[0], line[1]), (line[line.len() - 1], line[line.len() - 2])] {
        let len = planar_distance(inner, end);
        if len > 1e-9 {
            out.push([
                end[0] + (end[0] - inner[0]) / len * offset,
                end[1] + (end[1] - inner[1]) / len * offset,
            ]);
        }
    }
    out
}

fn access_of<T: HasAccessRestriction>(asm: &mut GraphAssembler, item: &T) -> AccessSetId {
    match item.access_restriction() {
        None => 0,
        Some(restriction) => {
            let number = asm.declare_restriction(restriction);
            asm.intern_access(&[number])
        }
    }
}

/// Collect every problem with the input before any geometry work
pub fn validate(venue: &VenueGeometry, registry: &WayTypeRegistry) -> Vec<String> {
    let mut problems = Vec::new();

    check_duplicates("restriction", venue.restrictions.iter().map(String::as_str), &mut problems);
    check_duplicates("level", venue.levels.iter().map(|l| l.id.as_str()), &mut problems);
    check_duplicates("space", venue.spaces.iter().map(|s| s.id.as_str()), &mut problems);
    check_duplicates("door", venue.doors.iter().map(|d| d.id.as_str()), &mut problems);
    check_duplicates("connector", venue.connectors.iter().map(|c| c.id.as_str()), &mut problems);
    check_duplicates(
        "obstacle",
        venue.obstacles.iter().filter_map(|o| o.id.as_deref()),
        &mut problems,
    );

    let levels: FxHashSet<&str> = venue.levels.iter().map(|l| l.id.as_str()).collect();
    let known: Vec<&str> = venue.restrictions.iter().map(String::as_str).collect();

    for level in &venue.levels {
        if !level.altitude.is_finite() {
            problems.push(format!("level '{}' has a non-finite altitude", level.id));
        }
    }

    for space in &venue.spaces {
        check_level("space", &space.id, space, &levels, &mut problems);
        check_restriction("space", &space.id, space, &known, &mut problems);
        if let Some(problem) = geometry::ring_problem(&geometry::open_ring(&space.polygon)) {
            problems.push(format!("space '{}': {problem}", space.id));
        }
        for (k, hole) in space.holes.iter().enumerate() {
            if let Some(problem) = geometry::ring_problem(&geometry::open_ring(hole)) {
                problems.push(format!("space '{}' hole {k}: {problem}", space.id));
            }
        }
    }

    for door in &venue.doors {
        check_level("door", &door.id, door, &levels, &mut problems);
        check_restriction("door", &door.id, door, &known, &mut problems);
        let [a, b] = door.segment;
        if a.iter().chain(&b).any(|v| !v.is_finite()) {
            problems.push(format!("door '{}' has non-finite coordinates", door.id));
        } else if planar_distance(a, b) < 1e-9 {
            problems.push(format!("door '{}' has zero length", door.id));
        }
    }

    for (k, obstacle) in venue.obstacles.iter().enumerate() {
        let label = obstacle.id.clone().unwrap_or_else(|| format!("#{k}"));
        check_level("obstacle", &label, obstacle, &levels, &mut problems);
        if obstacle.polygon.is_empty() && obstacle.line.is_empty() {
            problems.push(format!("obstacle '{label}' has neither polygon nor line"));
        }
        if !obstacle.polygon.is_empty() {
            if let Some(problem) = geometry::ring_problem(&geometry::open_ring(&obstacle.polygon)) {
                problems.push(format!("obstacle '{label}': {problem}"));
            }
        }
        if obstacle.line.len() == 1 {
            problems.push(format!("obstacle '{label}' line needs at least 2 points"));
        }
    }

    for connector in &venue.connectors {
        let id = &connector.id;
        check_restriction("connector", id, connector, &known, &mut problems);
        if connector.points.len() < 2 {
            problems.push(format!(
                "connector '{id}' has {} points, need at least 2",
                connector.points.len()
            ));
            continue;
        }
        for (k, point) in connector.points.iter().enumerate() {
            if !levels.contains(point.level.as_str()) {
                problems.push(format!(
                    "connector '{id}' point {k} references unknown level '{}'",
                    point.level
                ));
            }
            if !point.altitude.is_finite() || point.position.iter().any(|v| !v.is_finite()) {
                problems.push(format!("connector '{id}' point {k} is not finite"));
            }
        }
        if let Some(name) = &connector.way_type {
            if let Err(e) = registry.resolve_name(name) {
                problems.push(format!("connector '{id}': {e}"));
            }
        }
        if let Some(length) = connector.length {
            if !(length.is_finite() && length > 0.0) {
                problems.push(format!("connector '{id}' has invalid length {length}"));
            }
        }
        if connector.kind == ConnectorKind::Ramp {
            let markers: Vec<(Position, f64)> = connector
                .points
                .iter()
                .map(|p| (p.position, p.altitude))
                .collect();
            if let Err(e) = RampPath::new(&markers) {
                problems.push(format!("connector '{id}': {e}"));
            }
        }
    }

    problems
}

fn check_duplicates<'a>(
    kind: &str,
    ids: impl Iterator<Item = &'a str>,
    problems: &mut Vec<String>,
) {
    let mut seen = FxHashSet::default();
    for id in ids {
        if !seen.insert(id) {
            problems.push(format!("duplicate {kind} id '{id}'"));
        }
    }
}

fn check_level<T: HasLevel>(
    kind: &str,
    id: &str,
    item: &T,
    levels: &FxHashSet<&str>,
    problems: &mut Vec<String>,
) {
    if !levels.contains(item.level_id()) {
        problems.push(format!(
            "{kind} '{id}' references unknown level '{}'",
            item.level_id()
        ));
    }
}

fn check_restriction<T: HasAccessRestriction>(
    kind: &str,
    id: &str,
    item: &T,
    known: &[&str],
    problems: &mut Vec<String>,
) {
    if let Some(restriction) = item.access_restriction() {
        if !known.contains(&restriction) {
            let err = venue_common::Error::unknown_name("restriction", restriction, known);
            problems.push(format!("{kind} '{id}': {err}"));
        }
    }
}
