//! Venue geometry - the input model consumed from the map data provider
//!
//! Geometry entities are flat records. Connectors carry an explicit
//! [`ConnectorKind`] instead of one type per kind, and the behaviour shared by
//! several entities is expressed through the small [`HasLevel`] and
//! [`HasAccessRestriction`] traits.
//!
//! Coordinates are planar metres with the y axis pointing "up" on the map, so a
//! counter-clockwise heading change is a left turn.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;

/// Planar position `[x, y]` in metres
pub type Position = [f64; 2];

/// Versioned geometry snapshot of a venue
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VenueGeometry {
    /// Every access-restriction id that geometry may reference
    #[serde(default)]
    pub restrictions: Vec<String>,
    pub levels: Vec<LevelDef>,
    #[serde(default)]
    pub spaces: Vec<SpaceDef>,
    #[serde(default)]
    pub doors: Vec<DoorDef>,
    #[serde(default)]
    pub connectors: Vec<ConnectorDef>,
    #[serde(default)]
    pub obstacles: Vec<ObstacleDef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelDef {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub altitude: f64,
    #[serde(default)]
    pub order: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpaceDef {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub level: String,
    /// Exterior ring, either orientation, without a repeated closing point
    pub polygon: Vec<Position>,
    /// Interior rings (non-walkable courtyards, shafts)
    #[serde(default)]
    pub holes: Vec<Vec<Position>>,
    #[serde(default)]
    pub access_restriction: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoorDef {
    pub id: String,
    pub level: String,
    pub segment: [Position; 2],
    #[serde(default)]
    pub access_restriction: Option<String>,
}

/// Kind of vertical (or sloped) connector between levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectorKind {
    Stairs,
    Ramp,
    Elevator,
    Escalator,
}

/// One `(level, altitude, position)` point of a connector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectorPoint {
    pub level: String,
    pub altitude: f64,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectorDef {
    pub id: String,
    pub kind: ConnectorKind,
    #[serde(default)]
    pub name: Option<String>,
    /// Ordered points; for ramps these double as altitude markers
    pub points: Vec<ConnectorPoint>,
    /// Declared traversal length; geometric length when absent
    #[serde(default)]
    pub length: Option<f64>,
    /// Traversable only from the first point towards the last
    #[serde(default)]
    pub one_way: bool,
    /// Way type name overriding the kind's default (`"freight-elevator"`)
    #[serde(default)]
    pub way_type: Option<String>,
    #[serde(default)]
    pub access_restriction: Option<String>,
}

/// Non-walkable area or barrier line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObstacleDef {
    #[serde(default)]
    pub id: Option<String>,
    pub level: String,
    /// Closed ring blocking an area
    #[serde(default)]
    pub polygon: Vec<Position>,
    /// Open polyline blocking line-of-sight (railings, partitions)
    #[serde(default)]
    pub line: Vec<Position>,
}

/// Entities placed on a single level
pub trait HasLevel {
    fn level_id(&self) -> &str;
}

/// Entities that may require an access restriction to traverse
pub trait HasAccessRestriction {
    fn access_restriction(&self) -> Option<&str>;
}

impl HasLevel for SpaceDef {
    fn level_id(&self) -> &str {
        &self.level
    }
}

impl HasLevel for DoorDef {
    fn level_id(&self) -> &str {
        &self.level
    }
}

impl HasLevel for ObstacleDef {
    fn level_id(&self) -> &str {
        &self.level
    }
}

impl HasAccessRestriction for SpaceDef {
    fn access_restriction(&self) -> Option<&str> {
        self.access_restriction.as_deref()
    }
}

impl HasAccessRestriction for DoorDef {
    fn access_restriction(&self) -> Option<&str> {
        self.access_restriction.as_deref()
    }
}

impl HasAccessRestriction for ConnectorDef {
    fn access_restriction(&self) -> Option<&str> {
        self.access_restriction.as_deref()
    }
}

impl VenueGeometry {
    pub fn from_json_str(json: &str) -> venue_common::Result<Self> {
        serde_json::from_str(json).map_err(|e| venue_common::Error::Parse(e.to_string()))
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> venue_common::Result<Self> {
        let json = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&json)
    }

    /// SHA-256 of the canonical JSON encoding, hex encoded
    pub fn fingerprint(&self) -> String {
        let bytes = serde_json::to_vec(self).unwrap_or_default();
        hex::encode(Sha256::digest(&bytes))
    }

    pub fn level(&self, id: &str) -> Option<&LevelDef> {
        self.levels.iter().find(|l| l.id == id)
    }
}
