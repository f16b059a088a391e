//! Per-level spatial indexes for snapping positions to nodes and spaces

use geo::{Area, BoundingRect, Intersects, Point, Polygon};
use rstar::{PointDistance, RTree, RTreeObject, AABB};

use crate::venue::Position;

use super::NodeId;

/// Node position with its id for the R-tree
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct IndexedPoint {
    pub coords: [f64; 2],
    pub node: NodeId,
}

impl RTreeObject for IndexedPoint {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.coords)
    }
}

impl PointDistance for IndexedPoint {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dx = self.coords[0] - point[0];
        let dy = self.coords[1] - point[1];
        dx * dx + dy * dy
    }

    fn contains_point(&self, point: &[f64; 2]) -> bool {
        self.coords == *point
    }
}

/// One R-tree of nodes per level
#[derive(Debug, Default)]
pub struct NodeIndex {
    levels: Vec<RTree<IndexedPoint>>,
}

impl NodeIndex {
    /// Build from `(level, position)` per node, in node id order
    pub fn build(n_levels: usize, nodes: impl Iterator<Item = (u32, Position)>) -> Self {
        let mut per_level: Vec<Vec<IndexedPoint>> = vec![Vec::new(); n_levels];
        for (id, (level, coords)) in nodes.enumerate() {
            if let Some(points) = per_level.get_mut(level as usize) {
                points.push(IndexedPoint {
                    coords,
                    node: id as NodeId,
                });
            }
        }
        Self {
            levels: per_level.into_iter().map(RTree::bulk_load).collect(),
        }
    }

    /// Nearest node on `level` accepted by `accept`.
    ///
    /// Equidistant candidates resolve to the lowest node id, so the answer
    /// does not depend on R-tree layout.
    pub fn nearest<F>(&self, level: u32, pos: Position, mut accept: F) -> Option<NodeId>
    where
        F: FnMut(NodeId) -> bool,
    {
        let tree = self.levels.get(level as usize)?;
        let mut best: Option<(f64, NodeId)> = None;
        for (point, d2) in tree.nearest_neighbor_iter_with_distance_2(&pos) {
            if let Some((best_d2, _)) = best {
                if d2 > best_d2 {
                    break;
                }
            }
            if !accept(point.node) {
                continue;
            }
            best = match best {
                Some((bd, bn)) if bd == d2 && bn < point.node => Some((bd, bn)),
                _ => Some((d2, point.node)),
            };
        }
        best.map(|(_, node)| node)
    }
}

/// Space bounding box with its index for the R-tree
#[derive(Clone, Debug, PartialEq)]
pub struct IndexedSpace {
    envelope: AABB<[f64; 2]>,
    pub space: u32,
}

impl RTreeObject for IndexedSpace {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

#[derive(Debug, Clone)]
struct SpaceEntry {
    polygon: Polygon<f64>,
    area: f64,
}

/// Point-in-space lookup per level
#[derive(Debug, Default)]
pub struct SpaceIndex {
    entries: Vec<SpaceEntry>,
    levels: Vec<RTree<IndexedSpace>>,
}

impl SpaceIndex {
    /// Build from `(level, polygon)` per space, in space index order
    pub fn build(n_levels: usize, spaces: Vec<(u32, Polygon<f64>)>) -> Self {
        let mut per_level: Vec<Vec<IndexedSpace>> = vec![Vec::new(); n_levels];
        let mut entries = Vec::with_capacity(spaces.len());

        for (idx, (level, polygon)) in spaces.into_iter().enumerate() {
            if let (Some(rect), Some(bucket)) =
                (polygon.bounding_rect(), per_level.get_mut(level as usize))
            {
                bucket.push(IndexedSpace {
                    envelope: AABB::from_corners(
                        [rect.min().x, rect.min().y],
                        [rect.max().x, rect.max().y],
                    ),
                    space: idx as u32,
                });
            }
            let area = polygon.unsigned_area();
            entries.push(SpaceEntry { polygon, area });
        }

        Self {
            entries,
            levels: per_level.into_iter().map(RTree::bulk_load).collect(),
        }
    }

    /// Every space on `level` containing `pos` (boundary included), ascending
    pub fn spaces_at(&self, level: u32, pos: Position) -> Vec<u32> {
        let Some(tree) = self.levels.get(level as usize) else {
            return Vec::new();
        };
        let point = Point::new(pos[0], pos[1]);
        let mut found: Vec<u32> = tree
            .locate_in_envelope_intersecting(&AABB::from_point(pos))
            .map(|s| s.space)
            .filter(|&s| self.entries[s as usize].polygon.intersects(&point))
            .collect();
        found.sort_unstable();
        found
    }

    /// Containing space; overlaps resolve to the smallest area, then lowest index
    pub fn space_at(&self, level: u32, pos: Position) -> Option<u32> {
        self.spaces_at(level, pos).into_iter().min_by(|&a, &b| {
            let (ea, eb) = (&self.entries[a as usize], &self.entries[b as usize]);
            ea.area.total_cmp(&eb.area).then(a.cmp(&b))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::geometry::to_polygon;

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Polygon<f64> {
        to_polygon(&[[x0, y0], [x1, y0], [x1, y1], [x0, y1]], &[])
    }

    #[test]
    fn test_nearest_prefers_lowest_id_on_tie() {
        let nodes = vec![(0, [2.0, 0.0]), (0, [-2.0, 0.0]), (1, [0.0, 0.0])];
        let index = NodeIndex::build(2, nodes.into_iter());
        assert_eq!(index.nearest(0, [0.0, 0.0], |_| true), Some(0));
        assert_eq!(index.nearest(0, [-1.5, 0.0], |_| true), Some(1));
        assert_eq!(index.nearest(1, [5.0, 5.0], |_| true), Some(2));
    }

    #[test]
    fn test_nearest_respects_filter() {
        let nodes = vec![(0, [1.0, 0.0]), (0, [5.0, 0.0])];
        let index = NodeIndex::build(1, nodes.into_iter());
        assert_eq!(index.nearest(0, [0.0, 0.0], |n| n != 0), Some(1));
        assert_eq!(index.nearest(0, [0.0, 0.0], |_| false), None);
        assert_eq!(index.nearest(3, [0.0, 0.0], |_| true), None);
    }

    #[test]
    fn test_space_at_prefers_smallest_space() {
        let index = SpaceIndex::build(
            2,
            vec![
                (0, rect(0.0, 0.0, 20.0, 20.0)),
                (0, rect(5.0, 5.0, 10.0, 10.0)),
                (1, rect(0.0, 0.0, 20.0, 20.0)),
            ],
        );
        assert_eq!(index.space_at(0, [1.0, 1.0]), Some(0));
        assert_eq!(index.space_at(0, [6.0, 6.0]), Some(1));
        assert_eq!(index.spaces_at(0, [6.0, 6.0]), vec![0, 1]);
        assert_eq!(index.space_at(1, [6.0, 6.0]), Some(2));
        assert_eq!(index.space_at(0, [30.0, 1.0]), None);
        // Boundary counts as inside
        assert_eq!(index.space_at(0, [20.0, 3.0]), Some(0));
    }
}
