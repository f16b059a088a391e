//! Ramp altitude profiles.
//!
//! A ramp declares altitude markers at positions along its path. Altitude at
//! any distance along the ramp is the piecewise-linear interpolation between
//! the surrounding markers, so partial horizontal travel maps to a
//! proportional rise. Outside the marker range the altitude is clamped to the
//! first/last marker.

use thiserror::Error;

use crate::venue::Position;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RampError {
    #[error("ramp needs at least two markers, got {0}")]
    TooFewMarkers(usize),
    #[error("ramp markers must have increasing distance (marker {0})")]
    Unordered(usize),
    #[error("ramp marker {0} is not finite")]
    NotFinite(usize),
}

/// `(distance along, altitude)` markers with linear interpolation between them
#[derive(Debug, Clone, PartialEq)]
pub struct RampProfile {
    markers: Vec<(f64, f64)>,
}

impl RampProfile {
    pub fn new(markers: Vec<(f64, f64)>) -> Result<Self, RampError> {
        if markers.len() < 2 {
            return Err(RampError::TooFewMarkers(markers.len()));
        }
        for (i, &(d, alt)) in markers.iter().enumerate() {
            if !d.is_finite() || !alt.is_finite() {
                return Err(RampError::NotFinite(i));
            }
            if i > 0 && d <= markers[i - 1].0 {
                return Err(RampError::Unordered(i));
            }
        }
        Ok(Self { markers })
    }

    pub fn markers(&self) -> &[(f64, f64)] {
        &self.markers
    }

    /// Distance covered by the markers
    pub fn length(&self) -> f64 {
        self.markers[self.markers.len() - 1].0 - self.markers[0].0
    }

    pub fn altitude_at(&self, distance: f64) -> f64 {
        let first = self.markers[0];
        let last = self.markers[self.markers.len() - 1];
        if distance <= first.0 {
            return first.1;
        }
        if distance >= last.0 {
            return last.1;
        }

        // First marker strictly beyond `distance`; guaranteed in 1..len
        let upper = self.markers.partition_point(|&(d, _)| d <= distance);
        let (d0, a0) = self.markers[upper - 1];
        let (d1, a1) = self.markers[upper];
        let t = (distance - d0) / (d1 - d0);
        a0 + (a1 - a0) * t
    }

    /// Signed altitude change travelling from `from` to `to`
    pub fn rise_between(&self, from: f64, to: f64) -> f64 {
        self.altitude_at(to) - self.altitude_at(from)
    }

    /// Every marker distance plus samples every `step` in between, ascending
    pub fn sample_distances(&self, step: f64) -> Vec<f64> {
        let mut samples = Vec::new();
        for pair in self.markers.windows(2) {
            let (d0, d1) = (pair[0].0, pair[1].0);
            samples.push(d0);
            if step > 0.0 {
                let n = ((d1 - d0) / step).ceil() as usize;
                for k in 1..n {
                    samples.push(d0 + (d1 - d0) * k as f64 / n as f64);
                }
            }
        }
        samples.push(self.markers[self.markers.len() - 1].0);
        samples
    }
}

/// Ramp path: a planar polyline with an altitude profile over its arc length
#[derive(Debug, Clone)]
pub struct RampPath {
    points: Vec<Position>,
    cumulative: Vec<f64>,
    profile: RampProfile,
}

impl RampPath {
    /// Build from ordered `(position, altitude)` points. Consecutive points with
    /// identical positions are rejected since they give no horizontal extent.
    pub fn new(points: &[(Position, f64)]) -> Result<Self, RampError> {
        let mut cumulative = Vec::with_capacity(points.len());
        let mut total = 0.0;
        for (i, (p, _)) in points.iter().enumerate() {
            if i > 0 {
                total += planar_distance(points[i - 1].0, *p);
            }
            cumulative.push(total);
        }
        let markers = cumulative
            .iter()
            .zip(points)
            .map(|(&d, &(_, alt))| (d, alt))
            .collect();
        let profile = RampProfile::new(markers)?;
        Ok(Self {
            points: points.iter().map(|(p, _)| *p).collect(),
            cumulative,
            profile,
        })
    }

    pub fn profile(&self) -> &RampProfile {
        &self.profile
    }

    /// Index of the declared point whose segment contains `distance`
    pub fn segment_index(&self, distance: f64) -> usize {
        let upper = self.cumulative.partition_point(|&d| d <= distance);
        upper.saturating_sub(1).min(self.points.len() - 2)
    }

    pub fn position_at(&self, distance: f64) -> Position {
        let i = self.segment_index(distance);
        let (d0, d1) = (self.cumulative[i], self.cumulative[i + 1]);
        let t = ((distance - d0) / (d1 - d0)).clamp(0.0, 1.0);
        let (a, b) = (self.points[i], self.points[i + 1]);
        [a[0] + (b[0] - a[0]) * t, a[1] + (b[1] - a[1]) * t]
    }
}

pub fn planar_distance(a: Position, b: Position) -> f64 {
    ((b[0] - a[0]).powi(2) + (b[1] - a[1]).powi(2)).sqrt()
}
