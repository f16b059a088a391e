//! Nearby clustering - collapse visually overlapping points into markers
//!
//! At zoom `z` one map unit spans `pixels_per_unit × 2^z` screen pixels.
//! Points on the same level closer than `pixel_threshold` pixels are merged,
//! transitively, with a union-find over an R-tree neighbour query. Points are
//! sorted into a canonical order first so that the clusters never depend on
//! the order the caller listed them in.

use rstar::{PointDistance, RTree, RTreeObject, AABB};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct NearbyPoint {
    pub id: String,
    pub level: String,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Cluster {
    pub level: String,
    /// Member closest to the cluster centroid
    pub representative: NearbyPoint,
    pub members: Vec<NearbyPoint>,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Screen distance at or below which points merge (px)
    pub pixel_threshold: f64,
    /// Screen pixels per map unit at zoom 0
    pub pixels_per_unit: f64,
    pub max_zoom: f64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            pixel_threshold: 10.0,
            pixels_per_unit: 1.0,
            max_zoom: 24.0,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ClusterError {
    #[error("zoom {zoom} is outside 0..={max}")]
    InvalidZoom { zoom: f64, max: f64 },
    #[error("point '{0}' has non-finite coordinates")]
    NonFinite(String),
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct IndexedPoint {
    coords: [f64; 2],
    idx: usize,
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
}

/// Union-find; the root of a set is always its smallest index
struct DisjointSet {
    parent: Vec<usize>,
}

impl DisjointSet {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            let (lo, hi) = if ra < rb { (ra, rb) } else { (rb, ra) };
            self.parent[hi] = lo;
        }
    }
}

fn canonical_cmp(a: &NearbyPoint, b: &NearbyPoint) -> std::cmp::Ordering {
    a.level
        .cmp(&b.level)
        .then(a.x.total_cmp(&b.x))
        .then(a.y.total_cmp(&b.y))
        .then(a.id.cmp(&b.id))
}

/// Cluster points for display at `zoom`.
pub fn cluster_points(
    points: &[NearbyPoint],
    zoom: f64,
    config: &ClusterConfig,
) -> Result<Vec<Cluster>, ClusterError> {
    if !zoom.is_finite() || zoom < 0.0 || zoom > config.max_zoom {
        return Err(ClusterError::InvalidZoom {
            zoom,
            max: config.max_zoom,
        });
    }
    if let Some(p) = points.iter().find(|p| !p.x.is_finite() || !p.y.is_finite()) {
        return Err(ClusterError::NonFinite(p.id.clone()));
    }

    let mut sorted = points.to_vec();
    sorted.sort_by(canonical_cmp);

    let scale = config.pixels_per_unit * 2f64.powf(zoom);
    let radius = config.pixel_threshold / scale;
    let radius_2 = radius * radius;

    let mut sets = DisjointSet::new(sorted.len());
    let mut start = 0;
    while start < sorted.len() {
        let level = &sorted[start].level;
        let end = start + sorted[start..].iter().take_while(|p| &p.level == level).count();

        let tree = RTree::bulk_load(
            (start..end)
                .map(|idx| IndexedPoint {
                    coords: [sorted[idx].x, sorted[idx].y],
                    idx,
                })
                .collect(),
        );
        for idx in start..end {
            let here = [sorted[idx].x, sorted[idx].y];
            for neighbour in tree.locate_within_distance(here, radius_2) {
                sets.union(idx, neighbour.idx);
            }
        }
        start = end;
    }

    let mut groups: Vec<Vec<usize>> = vec![Vec::new(); sorted.len()];
    for idx in 0..sorted.len() {
        let root = sets.find(idx);
        groups[root].push(idx);
    }

    let mut clusters: Vec<Cluster> = groups
        .into_iter()
        .filter(|members| !members.is_empty())
        .map(|members| {
            let n = members.len() as f64;
            let cx = members.iter().map(|&i| sorted[i].x).sum::<f64>() / n;
            let cy = members.iter().map(|&i| sorted[i].y).sum::<f64>() / n;
            // Members are in canonical order, so min_by keeps the first on ties
            let rep = members
                .iter()
                .copied()
                .min_by(|&a, &b| {
                    let da = (sorted[a].x - cx).powi(2) + (sorted[a].y - cy).powi(2);
                    let db = (sorted[b].x - cx).powi(2) + (sorted[b].y - cy).powi(2);
                    da.total_cmp(&db)
                })
                .unwrap_or(members[0]);
            Cluster {
                level: sorted[rep].level.clone(),
                representative: sorted[rep].clone(),
                count: members.len(),
                members: members.iter().map(|&i| sorted[i].clone()).collect(),
            }
        })
        .collect();

    clusters.sort_by(|a, b| canonical_cmp(&a.representative, &b.representative));
    Ok(clusters)
}
