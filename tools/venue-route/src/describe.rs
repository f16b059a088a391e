//! Route description - turn-by-turn instructions and a summary for a path
//!
//! The path is split into legs. Consecutive edges of one connector form a
//! single leg, so riding an elevator past several stops is one instruction.
//! Consecutive walk edges stay in one leg while their heading changes by no
//! more than the turn threshold; a larger change starts a new leg with a
//! turn instruction. Headings use the map convention (y up), so a positive
//! heading change is a left turn.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::graph::{EdgeId, NodeId, RouteGraph};
use crate::graph::ramp::planar_distance;
use crate::location::ResolvedLocation;
use crate::search::Path;

/// Walk legs shorter than this are folded away (m)
const MIN_WALK_LEG: f64 = 0.5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DescribeConfig {
    /// Heading change above which a turn is announced (degrees)
    pub turn_threshold_deg: f64,
    /// Base walking speed (m/s)
    pub walking_speed: f64,
}

impl Default for DescribeConfig {
    fn default() -> Self {
        Self {
            turn_threshold_deg: 25.0,
            walking_speed: 1.4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Instruction {
    pub icon: String,
    pub text: String,
    /// Level id where the instruction starts
    pub level: String,
    /// Length covered by the instruction (m)
    pub distance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RouteSummary {
    /// Total 3D length including approach legs (m)
    pub distance: f64,
    /// Estimated walking time (s)
    pub time: f64,
    /// Search cost in cost units
    pub cost: u64,
    pub level_changes: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LegKind {
    Walk,
    Connector(u32),
}

#[derive(Debug)]
struct Leg {
    kind: LegKind,
    edges: Vec<EdgeId>,
    /// Heading change entering this leg (degrees, left positive)
    turn: Option<f64>,
}

/// Heading change from `from` to `to`, normalised to (-180, 180]
pub fn heading_delta(from: f64, to: f64) -> f64 {
    let mut delta = (to - from) % 360.0;
    if delta > 180.0 {
        delta -= 360.0;
    } else if delta <= -180.0 {
        delta += 360.0;
    }
    delta
}

/// `(icon, verb)` for a heading change beyond the turn threshold
pub fn classify_turn(delta: f64) -> (&'static str, &'static str) {
    let side = if delta > 0.0 { "left" } else { "right" };
    let magnitude = delta.abs();
    match (magnitude, side) {
        (m, "left") if m < 60.0 => ("turn-slight-left", "Turn slight left"),
        (m, _) if m < 60.0 => ("turn-slight-right", "Turn slight right"),
        (m, "left") if m < 135.0 => ("turn-left", "Turn left"),
        (m, _) if m < 135.0 => ("turn-right", "Turn right"),
        (_, "left") => ("turn-sharp-left", "Turn sharp left"),
        _ => ("turn-sharp-right", "Turn sharp right"),
    }
}

fn heading(graph: &RouteGraph, edge: EdgeId) -> Option<f64> {
    let e = graph.edge(edge);
    let (a, b) = (graph.node(e.from), graph.node(e.to));
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    if dx.hypot(dy) < 1e-6 {
        return None;
    }
    Some(dy.atan2(dx).to_degrees())
}

fn split_legs(graph: &RouteGraph, path: &Path, threshold: f64) -> Vec<Leg> {
    let mut legs: Vec<Leg> = Vec::new();
    let mut last_heading: Option<f64> = None;

    for &edge_id in &path.edges {
        let edge = graph.edge(edge_id);
        if let Some(connector) = edge.connector {
            match legs.last_mut() {
                Some(leg) if leg.kind == LegKind::Connector(connector) => leg.edges.push(edge_id),
                _ => legs.push(Leg {
                    kind: LegKind::Connector(connector),
                    edges: vec![edge_id],
                    turn: None,
                }),
            }
            last_heading = None;
            continue;
        }

        let current = heading(graph, edge_id);
        let turn = match (last_heading, current) {
            (Some(prev), Some(h)) => Some(heading_delta(prev, h)).filter(|d| d.abs() > threshold),
            _ => None,
        };
        match legs.last_mut() {
            Some(leg) if leg.kind == LegKind::Walk && turn.is_none() => leg.edges.push(edge_id),
            _ => legs.push(Leg {
                kind: LegKind::Walk,
                edges: vec![edge_id],
                turn,
            }),
        }
        if current.is_some() {
            last_heading = current;
        }
    }
    legs
}

fn place_name(graph: &RouteGraph, node: NodeId) -> String {
    let n = graph.node(node);
    match n.spaces.first() {
        Some(&space) => {
            let record = graph.space(space);
            record.name.clone().unwrap_or_else(|| record.id.clone())
        }
        None => level_name(graph, n.level),
    }
}

fn level_name(graph: &RouteGraph, level: u32) -> String {
    let l = graph.level(level);
    l.name.clone().unwrap_or_else(|| l.id.clone())
}

/// Instructions and summary for a found path
pub fn describe(
    graph: &RouteGraph,
    path: &Path,
    origin: &ResolvedLocation,
    destination: &ResolvedLocation,
    config: &DescribeConfig,
) -> (Vec<Instruction>, RouteSummary) {
    let registry = graph.way_types();
    let first = path.nodes.first().copied().unwrap_or(origin.node);
    let last = path.nodes.last().copied().unwrap_or(destination.node);
    let level_id = |node: NodeId| graph.level(graph.node(node).level).id.clone();

    if path.edges.is_empty() {
        let distance = planar_distance(origin.position, destination.position);
        let arrive = Instruction {
            icon: "arrive".to_string(),
            text: format!("You are at {}", place_name(graph, last)),
            level: level_id(last),
            distance,
        };
        let summary = RouteSummary {
            distance,
            time: distance / config.walking_speed,
            cost: 0,
            level_changes: 0,
        };
        return (vec![arrive], summary);
    }

    let mut instructions = vec![Instruction {
        icon: "depart".to_string(),
        text: format!("Start at {}", place_name(graph, first)),
        level: level_id(first),
        distance: origin.approach,
    }];

    let approach = origin.approach + destination.approach;
    let mut distance = approach;
    let mut time = approach / config.walking_speed;
    // Heading change of folded walk legs, announced with the next walk leg
    let mut pending_turn: Option<f64> = None;

    for leg in split_legs(graph, path, config.turn_threshold_deg) {
        let leg_length: f64 = leg.edges.iter().map(|&e| graph.edge(e).length()).sum();
        for &e in &leg.edges {
            let edge = graph.edge(e);
            let speed = config.walking_speed * registry.get(edge.way_type).speed_factor;
            time += edge.length() / speed;
        }
        distance += leg_length;

        let start = graph.edge(leg.edges[0]).from;
        let end = graph.edge(leg.edges[leg.edges.len() - 1]).to;

        match leg.kind {
            LegKind::Walk => {
                let turn = match (pending_turn.take(), leg.turn) {
                    (Some(folded), Some(own)) => Some(heading_delta(0.0, folded + own)),
                    (folded, own) => folded.or(own),
                };
                if leg_length < MIN_WALK_LEG {
                    pending_turn = turn;
                    continue;
                }
                let turn = turn.filter(|d| d.abs() > config.turn_threshold_deg);
                let (icon, text) = match turn {
                    Some(delta) => {
                        let (icon, verb) = classify_turn(delta);
                        (icon.to_string(), format!("{verb}, then walk {leg_length:.0} m"))
                    }
                    None => ("straight".to_string(), format!("Walk {leg_length:.0} m")),
                };
                instructions.push(Instruction {
                    icon,
                    text,
                    level: level_id(start),
                    distance: leg_length,
                });
            }
            LegKind::Connector(connector) => {
                pending_turn = None;
                let record = graph.connector(connector);
                let way_type = registry.get(record.way_type);
                time += way_type.transition_time;

                let rise: f64 = leg.edges.iter().map(|&e| graph.edge(e).rise).sum();
                let direction = if rise > 1e-6 {
                    Some("up")
                } else if rise < -1e-6 {
                    Some("down")
                } else {
                    None
                };
                let icon = match direction {
                    Some(dir) => format!("{}-{dir}", way_type.icon()),
                    None => way_type.icon().to_string(),
                };
                let (from_level, to_level) = (graph.node(start).level, graph.node(end).level);
                let label = record.name.clone().unwrap_or_else(|| way_type.label().to_string());
                let text = match (direction, from_level != to_level) {
                    (Some(dir), true) => {
                        format!("Take the {label} {dir} to {}", level_name(graph, to_level))
                    }
                    (None, true) => format!("Take the {label} to {}", level_name(graph, to_level)),
                    (Some(dir), false) => format!("Take the {label} {dir}"),
                    (None, false) => format!("Take the {label}"),
                };
                instructions.push(Instruction {
                    icon,
                    text,
                    level: level_id(start),
                    distance: leg_length,
                });
            }
        }
    }

    instructions.push(Instruction {
        icon: "arrive".to_string(),
        text: format!("Arrive at {}", place_name(graph, last)),
        level: level_id(last),
        distance: destination.approach,
    });

    let summary = RouteSummary {
        distance,
        time,
        cost: path.cost,
        level_changes: path.level_changes,
    };
    (instructions, summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::tests::walk_node;
    use crate::graph::{ConnectorRecord, EdgeSpec, GraphAssembler, Level};
    use crate::options::Constraints;
    use crate::search::{AccessFilter, PathFinder, SearchLimits};
    use crate::venue::ConnectorKind;
    use crate::way_type::{WayTypeId, WayTypeRegistry};
    use std::sync::Arc;

    fn at(graph: &RouteGraph, node: NodeId) -> ResolvedLocation {
        ResolvedLocation {
            node,
            level: graph.node(node).level,
            position: graph.node(node).position(),
            approach: 0.0,
        }
    }

    fn route(graph: &RouteGraph, from: NodeId, to: NodeId) -> (Vec<Instruction>, RouteSummary) {
        let constraints = Constraints::unconstrained(graph.way_types());
        let access = AccessFilter::unrestricted(graph);
        let path = PathFinder::new(graph, &constraints, &access)
            .shortest_path(from, to, &SearchLimits::none())
            .unwrap();
        describe(graph, &path, &at(graph, from), &at(graph, to), &DescribeConfig::default())
    }

    fn walk(asm: &mut GraphAssembler, a: NodeId, b: NodeId) {
        let (pa, pb) = (asm.node(a).position(), asm.node(b).position());
        let d = planar_distance(pa, pb);
        asm.add_bidirectional(EdgeSpec::new(a, b, WayTypeId::WALK, crate::graph::cost_units(d)).planar(d));
    }

    fn level(id: &str, altitude: f64) -> Level {
        Level {
            id: id.into(),
            name: Some(format!("Floor {id}")),
            altitude,
            order: altitude as i32,
        }
    }

    #[test]
    fn test_heading_delta_wraps() {
        assert_eq!(heading_delta(170.0, -170.0), 20.0);
        assert_eq!(heading_delta(-170.0, 170.0), -20.0);
        assert_eq!(heading_delta(0.0, 180.0), 180.0);
        assert_eq!(heading_delta(90.0, 0.0), -90.0);
    }

    #[test]
    fn test_turn_classes() {
        assert_eq!(classify_turn(30.0).0, "turn-slight-left");
        assert_eq!(classify_turn(-90.0).0, "turn-right");
        assert_eq!(classify_turn(150.0).0, "turn-sharp-left");
        assert_eq!(classify_turn(-59.9).1, "Turn slight right");
    }

    #[test]
    fn test_walk_with_left_turn() {
        let mut asm = GraphAssembler::new(Arc::new(WayTypeRegistry::builtin()));
        asm.add_level(level("L0", 0.0));
        let a = asm.add_node(walk_node(0, 0.0, 0.0));
        let b = asm.add_node(walk_node(0, 10.0, 0.0));
        let c = asm.add_node(walk_node(0, 20.0, 1.0));
        let d = asm.add_node(walk_node(0, 20.0, 11.0));
        walk(&mut asm, a, b);
        walk(&mut asm, b, c);
        walk(&mut asm, c, d);
        let graph = asm.finish(1, String::new());

        let (instructions, summary) = route(&graph, a, d);
        let icons: Vec<&str> = instructions.iter().map(|i| i.icon.as_str()).collect();
        // a→b→c bends by under 6°, so it stays one leg; c→d is a left turn
        assert_eq!(icons, vec!["depart", "straight", "turn-left", "arrive"]);
        assert_eq!(instructions[2].text, "Turn left, then walk 10 m");
        assert!((summary.distance - (10.0 + 101.0_f64.sqrt() + 10.0)).abs() < 1e-9);
        assert!((summary.time - summary.distance / 1.4).abs() < 1e-9);
    }

    #[test]
    fn test_short_leg_turn_carries_into_next_leg() {
        let mut asm = GraphAssembler::new(Arc::new(WayTypeRegistry::builtin()));
        asm.add_level(level("L0", 0.0));
        let step = |from: (f64, f64), len: f64, deg: f64| {
            let r = deg.to_radians();
            (from.0 + len * r.cos(), from.1 + len * r.sin())
        };
        let pb = (10.0, 0.0);
        let pc = step(pb, 0.3, 50.0);
        let pd = step(pc, 10.0, 100.0);
        let a = asm.add_node(walk_node(0, 0.0, 0.0));
        let b = asm.add_node(walk_node(0, pb.0, pb.1));
        let c = asm.add_node(walk_node(0, pc.0, pc.1));
        let d = asm.add_node(walk_node(0, pd.0, pd.1));
        walk(&mut asm, a, b);
        walk(&mut asm, b, c);
        walk(&mut asm, c, d);
        let graph = asm.finish(1, String::new());

        // b→c is folded away; its 50° joins the next 50° into a full left turn
        let (instructions, _) = route(&graph, a, d);
        let icons: Vec<&str> = instructions.iter().map(|i| i.icon.as_str()).collect();
        assert_eq!(icons, vec!["depart", "straight", "turn-left", "arrive"]);
        assert_eq!(instructions[2].text, "Turn left, then walk 10 m");
    }

    #[test]
    fn test_short_jog_reads_as_straight() {
        let mut asm = GraphAssembler::new(Arc::new(WayTypeRegistry::builtin()));
        asm.add_level(level("L0", 0.0));
        let a = asm.add_node(walk_node(0, 0.0, 0.0));
        let b = asm.add_node(walk_node(0, 10.0, 0.0));
        let c = asm.add_node(walk_node(0, 10.0, 0.3));
        let d = asm.add_node(walk_node(0, 20.0, 0.3));
        walk(&mut asm, a, b);
        walk(&mut asm, b, c);
        walk(&mut asm, c, d);
        let graph = asm.finish(1, String::new());

        let (instructions, _) = route(&graph, a, d);
        let icons: Vec<&str> = instructions.iter().map(|i| i.icon.as_str()).collect();
        assert_eq!(icons, vec!["depart", "straight", "straight", "arrive"]);
        assert_eq!(instructions[2].text, "Walk 10 m");
    }

    #[test]
    fn test_elevator_ride_is_one_instruction() {
        let mut asm = GraphAssembler::new(Arc::new(WayTypeRegistry::builtin()));
        for (i, alt) in [0.0, 4.0, 8.0].into_iter().enumerate() {
            asm.add_level(level(&format!("L{i}"), alt));
        }
        let lift = asm.add_connector(ConnectorRecord {
            id: "e1".into(),
            name: None,
            kind: ConnectorKind::Elevator,
            way_type: WayTypeId::ELEVATOR,
        });
        let start = asm.add_node(walk_node(0, 0.0, 0.0));
        let mut stops = Vec::new();
        for l in 0..3u32 {
            let mut node = walk_node(l, 5.0, 0.0);
            node.altitude = 4.0 * l as f64;
            stops.push(asm.add_node(node));
        }
        let end = asm.add_node(walk_node(2, 5.0, 5.0));
        walk(&mut asm, start, stops[0]);
        walk(&mut asm, stops[2], end);
        // Stop-by-stop arcs only, so the ride must pass the middle stop
        for pair in stops.windows(2) {
            asm.add_bidirectional(
                EdgeSpec::new(pair[0], pair[1], WayTypeId::ELEVATOR, 10_000)
                    .rise(4.0)
                    .connector(lift),
            );
        }
        let graph = asm.finish(1, String::new());

        let (instructions, summary) = route(&graph, start, end);
        let lifts: Vec<&Instruction> = instructions
            .iter()
            .filter(|i| i.icon.starts_with("elevator"))
            .collect();
        assert_eq!(lifts.len(), 1);
        assert_eq!(lifts[0].icon, "elevator-up");
        assert_eq!(lifts[0].text, "Take the elevator up to Floor L2");
        assert_eq!(summary.level_changes, 2);
        // 5 m + 8 m ride + 5 m, plus one 30 s wait
        let expected = 5.0 / 1.4 + 8.0 / 1.4 + 30.0 + 5.0 / 1.4;
        assert!((summary.time - expected).abs() < 1e-9);
    }

    #[test]
    fn test_same_node_only_arrives() {
        let mut asm = GraphAssembler::new(Arc::new(WayTypeRegistry::builtin()));
        asm.add_level(level("L0", 0.0));
        let a = asm.add_node(walk_node(0, 0.0, 0.0));
        let graph = asm.finish(1, String::new());
        let (instructions, summary) = route(&graph, a, a);
        assert_eq!(instructions.len(), 1);
        assert_eq!(instructions[0].icon, "arrive");
        assert_eq!(summary.distance, 0.0);
        assert_eq!(summary.cost, 0);
    }
}
