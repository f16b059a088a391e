//! Way type catalog - traversal kinds with speed factors and penalties
//!
//! Each way type describes how a kind of edge is traversed: its relative walking
//! speed, the fixed transition penalty charged when entering it, and whether it
//! is excluded from routing unless a caller asks for it.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::venue::ConnectorKind;

/// Index into a [`WayTypeRegistry`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WayTypeId(pub u16);

impl WayTypeId {
    pub const WALK: WayTypeId = WayTypeId(0);
    pub const STAIRS: WayTypeId = WayTypeId(1);
    pub const RAMP: WayTypeId = WayTypeId(2);
    pub const ELEVATOR: WayTypeId = WayTypeId(3);
    pub const ESCALATOR: WayTypeId = WayTypeId(4);

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A category of traversal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WayType {
    /// Stable name used in requests and geometry (`"stairs"`)
    pub name: String,
    /// Relative walking speed multiplier (walk = 1.0)
    pub speed_factor: f64,
    /// Fixed cost added per connector edge, in metres of equivalent walking
    #[serde(default)]
    pub transition_penalty: f64,
    /// Fixed time added per traversal in the walking-time estimate (seconds)
    #[serde(default)]
    pub transition_time: f64,
    /// Excluded from routing unless explicitly included by the caller
    #[serde(default)]
    pub default_excluded: bool,
    /// Instruction icon stem (`"stairs"` renders as `stairs-up` / `stairs-down`)
    #[serde(default)]
    pub icon: Option<String>,
    /// Human-readable name used in instructions ("freight elevator")
    #[serde(default)]
    pub label: Option<String>,
}

impl WayType {
    fn builtin(name: &str, speed_factor: f64, transition_penalty: f64, transition_time: f64) -> Self {
        Self {
            name: name.to_string(),
            speed_factor,
            transition_penalty,
            transition_time,
            default_excluded: false,
            icon: None,
            label: None,
        }
    }

    pub fn icon(&self) -> &str {
        self.icon.as_deref().unwrap_or(&self.name)
    }

    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.name)
    }
}

/// Catalog of way types, indexed by [`WayTypeId`]
///
/// The five built-in types always occupy ids 0..5 so that
/// [`WayTypeId::WALK`] and friends stay valid after overrides.
#[derive(Debug, Clone)]
pub struct WayTypeRegistry {
    types: Vec<WayType>,
    by_name: FxHashMap<String, WayTypeId>,
}

impl Default for WayTypeRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl WayTypeRegistry {
    /// Built-in catalog: walk, stairs, ramp, elevator, escalator
    pub fn builtin() -> Self {
        let types = vec![
            WayType::builtin("walk", 1.0, 0.0, 0.0),
            WayType::builtin("stairs", 0.6, 5.0, 10.0),
            WayType::builtin("ramp", 0.9, 0.0, 0.0),
            WayType::builtin("elevator", 1.0, 15.0, 30.0),
            WayType::builtin("escalator", 1.2, 3.0, 5.0),
        ];
        Self::from_types(types)
    }

    /// Built-in catalog with entries replaced (matched by name) or appended.
    pub fn with_overrides(overrides: &[WayType]) -> Self {
        let mut registry = Self::builtin();
        for way_type in overrides {
            match registry.lookup(&way_type.name) {
                Some(id) => registry.types[id.index()] = way_type.clone(),
                None => {
                    let id = WayTypeId(registry.types.len() as u16);
                    registry.by_name.insert(way_type.name.to_lowercase(), id);
                    registry.types.push(way_type.clone());
                }
            }
        }
        registry
    }

    fn from_types(types: Vec<WayType>) -> Self {
        let by_name = types
            .iter()
            .enumerate()
            .map(|(i, t)| (t.name.to_lowercase(), WayTypeId(i as u16)))
            .collect();
        Self { types, by_name }
    }

    pub fn get(&self, id: WayTypeId) -> &WayType {
        &self.types[id.index()]
    }

    pub fn lookup(&self, name: &str) -> Option<WayTypeId> {
        self.by_name.get(&name.trim().to_lowercase()).copied()
    }

    /// Resolve a way-type name, failing with a fuzzy suggestion.
    pub fn resolve_name(&self, name: &str) -> venue_common::Result<WayTypeId> {
        self.lookup(name)
            .ok_or_else(|| venue_common::Error::unknown_name("way type", name, &self.names()))
    }

    pub fn names(&self) -> Vec<&str> {
        self.types.iter().map(|t| t.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (WayTypeId, &WayType)> {
        self.types
            .iter()
            .enumerate()
            .map(|(i, t)| (WayTypeId(i as u16), t))
    }

    /// Default way type for a connector kind
    pub fn for_connector(kind: ConnectorKind) -> WayTypeId {
        match kind {
            ConnectorKind::Stairs => WayTypeId::STAIRS,
            ConnectorKind::Ramp => WayTypeId::RAMP,
            ConnectorKind::Elevator => WayTypeId::ELEVATOR,
            ConnectorKind::Escalator => WayTypeId::ESCALATOR,
        }
    }
}
