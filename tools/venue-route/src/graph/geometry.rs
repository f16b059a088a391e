//! Planar geometry helpers for graph construction.
//!
//! Polygons arrive as plain rings of `[x, y]`. These helpers validate them,
//! sample visibility-graph candidate points (inset reflex corners of a space,
//! outset convex corners of obstacles) and answer line-of-sight queries.

use geo::line_intersection::{line_intersection, LineIntersection};
use geo::{Centroid, Contains, Coord, InteriorPoint, Intersects, Line, LineString, Point, Polygon};

use crate::venue::Position;

const EPS: f64 = 1e-9;

pub fn coord(p: Position) -> Coord<f64> {
    Coord { x: p[0], y: p[1] }
}

pub fn ring_to_linestring(ring: &[Position]) -> LineString<f64> {
    LineString::from(ring.iter().map(|&p| coord(p)).collect::<Vec<_>>())
}

pub fn to_polygon(exterior: &[Position], holes: &[Vec<Position>]) -> Polygon<f64> {
    Polygon::new(
        ring_to_linestring(exterior),
        holes.iter().map(|h| ring_to_linestring(h)).collect(),
    )
}

/// Drop a repeated closing point so rings are handled uniformly.
pub fn open_ring(ring: &[Position]) -> Vec<Position> {
    let mut out = ring.to_vec();
    if out.len() > 1 && out.first() == out.last() {
        out.pop();
    }
    out
}

/// Twice the signed area; positive for counter-clockwise rings
pub fn signed_area2(ring: &[Position]) -> f64 {
    let n = ring.len();
    (0..n)
        .map(|i| {
            let a = ring[i];
            let b = ring[(i + 1) % n];
            a[0] * b[1] - b[0] * a[1]
        })
        .sum()
}

/// Closed-ring edges as `geo` lines
pub fn ring_edges(ring: &[Position]) -> Vec<Line<f64>> {
    let n = ring.len();
    (0..n)
        .map(|i| Line::new(coord(ring[i]), coord(ring[(i + 1) % n])))
        .collect()
}

/// Open polyline edges as `geo` lines
pub fn polyline_edges(points: &[Position]) -> Vec<Line<f64>> {
    points
        .windows(2)
        .map(|w| Line::new(coord(w[0]), coord(w[1])))
        .collect()
}

/// Check a ring for degenerate or self-intersecting edges.
///
/// Adjacent edges may share their common vertex; any other contact between
/// two edges is a self-intersection.
pub fn ring_problem(ring: &[Position]) -> Option<String> {
    if ring.len() < 3 {
        return Some(format!("ring has {} vertices, need at least 3", ring.len()));
    }
    if ring.iter().any(|p| !p[0].is_finite() || !p[1].is_finite()) {
        return Some("ring has non-finite coordinates".to_string());
    }
    let edges = ring_edges(ring);
    let n = edges.len();
    for i in 0..n {
        for j in (i + 1)..n {
            let adjacent = j == i + 1 || (i == 0 && j == n - 1);
            match line_intersection(edges[i], edges[j]) {
                None => {}
                Some(LineIntersection::SinglePoint { .. }) if adjacent => {}
                Some(_) => {
                    return Some(format!("self-intersection between edges {i} and {j}"));
                }
            }
        }
    }
    if signed_area2(ring).abs() < EPS {
        return Some("ring has zero area".to_string());
    }
    None
}

/// Corner points pushed `offset` away from the ring along the corner bisector.
///
/// With `outward == false` the reflex corners of the ring are pushed into its
/// interior (where a walker turns around a wall corner). With `outward == true`
/// the convex corners are pushed outside (walking around an obstacle).
pub fn offset_corners(ring: &[Position], offset: f64, outward: bool) -> Vec<Position> {
    let n = ring.len();
    if n < 3 {
        return Vec::new();
    }
    let ccw = signed_area2(ring) > 0.0;
    let mut out = Vec::new();

    for i in 0..n {
        let prev = ring[(i + n - 1) % n];
        let cur = ring[i];
        let next = ring[(i + 1) % n];

        let d1 = normalize([cur[0] - prev[0], cur[1] - prev[1]]);
        let d2 = normalize([next[0] - cur[0], next[1] - cur[1]]);
        let (Some(d1), Some(d2)) = (d1, d2) else {
            continue;
        };

        let turn = d1[0] * d2[1] - d1[1] * d2[0];
        let convex = if ccw { turn > EPS } else { turn < -EPS };
        let reflex = if ccw { turn < -EPS } else { turn > EPS };
        if (outward && !convex) || (!outward && !reflex) {
            continue;
        }

        // Left normals point into a counter-clockwise ring
        let side = if ccw { 1.0 } else { -1.0 };
        let n1 = [-d1[1] * side, d1[0] * side];
        let n2 = [-d2[1] * side, d2[0] * side];
        let Some(bisector) = normalize([n1[0] + n2[0], n1[1] + n2[1]]) else {
            continue;
        };
        let sign = if outward { -1.0 } else { 1.0 };
        out.push([
            cur[0] + bisector[0] * offset * sign,
            cur[1] + bisector[1] * offset * sign,
        ]);
    }
    out
}

fn normalize(v: [f64; 2]) -> Option<[f64; 2]> {
    let len = (v[0] * v[0] + v[1] * v[1]).sqrt();
    if len < EPS {
        None
    } else {
        Some([v[0] / len, v[1] / len])
    }
}

/// Walkable region of one space: its polygon plus everything blocking sight
#[derive(Debug, Clone)]
pub struct SpaceShape {
    pub polygon: Polygon<f64>,
    /// Obstacle areas overlapping the space
    pub obstacles: Vec<Polygon<f64>>,
    /// Walls, hole rings, obstacle rings and barrier lines
    pub barriers: Vec<Line<f64>>,
}

impl SpaceShape {
    /// Inside or on the boundary of the space and outside every obstacle
    pub fn is_walkable(&self, p: Position) -> bool {
        let point = Point::new(p[0], p[1]);
        self.polygon.intersects(&point) && !self.obstacles.iter().any(|o| o.contains(&point))
    }

    /// A point inside the walkable area, preferring the centroid.
    pub fn representative_point(&self, fallbacks: &[Position]) -> Option<Position> {
        let candidates = self
            .polygon
            .centroid()
            .into_iter()
            .chain(self.polygon.interior_point())
            .map(|p| [p.x(), p.y()])
            .chain(fallbacks.iter().copied());

        for candidate in candidates {
            if self.is_walkable(candidate) {
                return Some(candidate);
            }
        }
        None
    }

    /// Straight-line visibility between two walkable points.
    ///
    /// The segment must not properly cross any barrier and its interior
    /// samples must stay walkable; the samples catch segments that leave the
    /// polygon through a vertex without properly crossing an edge.
    pub fn visible(&self, a: Position, b: Position) -> bool {
        let segment = Line::new(coord(a), coord(b));
        for barrier in &self.barriers {
            if let Some(LineIntersection::SinglePoint { is_proper: true, .. }) =
                line_intersection(segment, *barrier)
            {
                return false;
            }
        }
        [0.25, 0.5, 0.75].iter().all(|&t| {
            self.is_walkable([a[0] + (b[0] - a[0]) * t, a[1] + (b[1] - a[1]) * t])
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(x0: f64, y0: f64, size: f64) -> Vec<Position> {
        vec![[x0, y0], [x0 + size, y0], [x0 + size, y0 + size], [x0, y0 + size]]
    }

    // L-shaped room, counter-clockwise, reflex corner at (5, 5)
    fn l_shape() -> Vec<Position> {
        vec![[0.0, 0.0], [10.0, 0.0], [10.0, 5.0], [5.0, 5.0], [5.0, 10.0], [0.0, 10.0]]
    }

    fn shape(ring: &[Position], obstacles: &[Vec<Position>]) -> SpaceShape {
        let mut barriers = ring_edges(ring);
        for o in obstacles {
            barriers.extend(ring_edges(o));
        }
        SpaceShape {
            polygon: to_polygon(ring, &[]),
            obstacles: obstacles.iter().map(|o| to_polygon(o, &[])).collect(),
            barriers,
        }
    }

    #[test]
    fn test_ring_problem_detects_bow_tie() {
        let bow_tie = vec![[0.0, 0.0], [4.0, 4.0], [4.0, 0.0], [0.0, 4.0]];
        assert!(ring_problem(&bow_tie).unwrap().contains("self-intersection"));
        assert!(ring_problem(&square(0.0, 0.0, 4.0)).is_none());
        assert!(ring_problem(&l_shape()).is_none());
        assert!(ring_problem(&[[0.0, 0.0], [1.0, 1.0]]).is_some());
        assert!(ring_problem(&[[0.0, 0.0], [1.0, 1.0], [2.0, 2.0]]).is_some());
    }

    #[test]
    fn test_open_ring_drops_closing_point() {
        let mut ring = square(0.0, 0.0, 1.0);
        ring.push(ring[0]);
        assert_eq!(open_ring(&ring).len(), 4);
    }

    #[test]
    fn test_reflex_corner_is_inset() {
        let corners = offset_corners(&l_shape(), 0.5, false);
        assert_eq!(corners.len(), 1);
        let [x, y] = corners[0];
        assert!(x < 5.0 && y < 5.0, "inset corner {x},{y} should be inside the L");

        // Clockwise input gives the same corner
        let mut cw = l_shape();
        cw.reverse();
        let corners_cw = offset_corners(&cw, 0.5, false);
        assert_eq!(corners_cw.len(), 1);
        assert!((corners_cw[0][0] - x).abs() < 1e-9 && (corners_cw[0][1] - y).abs() < 1e-9);
    }

    #[test]
    fn test_obstacle_corners_are_outset() {
        let corners = offset_corners(&square(4.0, 4.0, 2.0), 0.5, true);
        assert_eq!(corners.len(), 4);
        for [x, y] in corners {
            let inside = x > 4.0 && x < 6.0 && y > 4.0 && y < 6.0;
            assert!(!inside, "outset corner {x},{y} must be outside the obstacle");
        }
    }

    #[test]
    fn test_visibility_around_reflex_corner() {
        let room = shape(&l_shape(), &[]);
        assert!(room.visible([1.0, 1.0], [9.0, 1.0]));
        assert!(room.visible([1.0, 1.0], [1.0, 9.0]));
        // Cuts across the missing quadrant
        assert!(!room.visible([9.0, 4.0], [4.0, 9.0]));
    }

    #[test]
    fn test_visibility_blocked_by_obstacle() {
        let room = shape(&square(0.0, 0.0, 10.0), &[square(4.0, 4.0, 2.0)]);
        assert!(!room.visible([1.0, 5.0], [9.0, 5.0]));
        assert!(room.visible([1.0, 1.0], [9.0, 1.0]));
        assert!(!room.is_walkable([5.0, 5.0]));
        assert!(room.is_walkable([10.0, 5.0]));
    }

    #[test]
    fn test_representative_point_avoids_obstacles() {
        let room = shape(&square(0.0, 0.0, 10.0), &[square(4.0, 4.0, 2.0)]);
        let rep = room.representative_point(&[[1.0, 1.0]]).unwrap();
        assert!(room.is_walkable(rep));

        let open = shape(&square(0.0, 0.0, 10.0), &[]);
        assert_eq!(open.representative_point(&[]), Some([5.0, 5.0]));
    }
}
