//! Route options resolver
//!
//! Turns the caller's [`RouteOptions`] into [`Constraints`] for one search:
//! a per-way-type exclusion flag and a per-way-type cost multiplier.
//! Speed preferences only scale costs; every multiplier is finite and
//! positive, so a preference never changes which nodes are reachable.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::graph::Edge;
use crate::way_type::{WayTypeId, WayTypeRegistry};

/// How strongly to favour or penalise vertical connectors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SpeedPreference {
    #[default]
    Default,
    /// Favour stairs and escalators over waiting for an elevator
    Fast,
    /// Avoid climbing; elevators preferred
    Comfortable,
    /// Step-free where possible
    Accessible,
}

impl SpeedPreference {
    pub fn all() -> &'static [SpeedPreference] {
        &[
            SpeedPreference::Default,
            SpeedPreference::Fast,
            SpeedPreference::Comfortable,
            SpeedPreference::Accessible,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            SpeedPreference::Default => "default",
            SpeedPreference::Fast => "fast",
            SpeedPreference::Comfortable => "comfortable",
            SpeedPreference::Accessible => "accessible",
        }
    }

    /// Cost multiplier for a way type, keyed by its icon stem so that custom
    /// types (a freight elevator) inherit the treatment of their base kind.
    pub fn multiplier(&self, kind: &str) -> f64 {
        match (self, kind) {
            (SpeedPreference::Fast, "stairs") => 0.9,
            (SpeedPreference::Fast, "escalator") => 0.8,
            (SpeedPreference::Fast, "elevator") => 1.3,
            (SpeedPreference::Comfortable, "stairs") => 2.0,
            (SpeedPreference::Comfortable, "ramp") => 1.2,
            (SpeedPreference::Comfortable, "elevator") => 0.8,
            (SpeedPreference::Accessible, "stairs") => 10.0,
            (SpeedPreference::Accessible, "escalator") => 5.0,
            (SpeedPreference::Accessible, "elevator") => 0.7,
            _ => 1.0,
        }
    }
}

impl fmt::Display for SpeedPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SpeedPreference {
    type Err = venue_common::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Self::all()
            .iter()
            .copied()
            .find(|p| p.name() == wanted)
            .ok_or_else(|| {
                let names: Vec<&str> = Self::all().iter().map(|p| p.name()).collect();
                venue_common::Error::unknown_name("speed preference", s, &names)
            })
    }
}

/// Caller preferences for one route request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct RouteOptions {
    /// Way types never to use (`["stairs", "escalator"]`)
    pub avoid: Vec<String>,
    /// Default-excluded way types to allow (`["freight-elevator"]`)
    pub include: Vec<String>,
    pub speed: SpeedPreference,
}

impl RouteOptions {
    pub fn avoiding<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            avoid: names.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }
}

/// Per-way-type search constraints
#[derive(Debug, Clone, PartialEq)]
pub struct Constraints {
    excluded: Vec<bool>,
    multipliers: Vec<f64>,
}

impl Constraints {
    /// Nothing excluded, every multiplier 1.0
    pub fn unconstrained(registry: &WayTypeRegistry) -> Self {
        Self {
            excluded: vec![false; registry.len()],
            multipliers: vec![1.0; registry.len()],
        }
    }

    #[inline]
    pub fn is_excluded(&self, way_type: WayTypeId) -> bool {
        self.excluded.get(way_type.index()).copied().unwrap_or(true)
    }

    #[inline]
    pub fn multiplier(&self, way_type: WayTypeId) -> f64 {
        self.multipliers.get(way_type.index()).copied().unwrap_or(1.0)
    }

    /// Search cost of an edge: `round(base_cost × multiplier)`
    #[inline]
    pub fn search_cost(&self, edge: &Edge) -> u32 {
        let m = self.multiplier(edge.way_type);
        if m == 1.0 {
            return edge.base_cost;
        }
        let scaled = (edge.base_cost as f64 * m).round();
        if scaled >= u32::MAX as f64 {
            u32::MAX
        } else {
            scaled as u32
        }
    }

    /// Smallest multiplier among usable way types
    pub fn min_multiplier(&self) -> f64 {
        self.multipliers
            .iter()
            .zip(&self.excluded)
            .filter(|(_, &excluded)| !excluded)
            .map(|(&m, _)| m)
            .fold(f64::INFINITY, f64::min)
            .min(1.0)
    }

    pub fn excluded_names<'a>(&self, registry: &'a WayTypeRegistry) -> Vec<&'a str> {
        registry
            .iter()
            .filter(|(id, _)| self.is_excluded(*id))
            .map(|(_, t)| t.name.as_str())
            .collect()
    }
}

/// Resolve options against a registry.
///
/// Default-excluded types stay excluded unless named in `include`; `avoid`
/// wins over `include`. Unknown names fail with a suggestion.
pub fn resolve_options(
    options: &RouteOptions,
    registry: &WayTypeRegistry,
) -> venue_common::Result<Constraints> {
    let avoid = options
        .avoid
        .iter()
        .map(|name| registry.resolve_name(name))
        .collect::<venue_common::Result<Vec<_>>>()?;
    let include = options
        .include
        .iter()
        .map(|name| registry.resolve_name(name))
        .collect::<venue_common::Result<Vec<_>>>()?;

    let mut constraints = Constraints::unconstrained(registry);
    for (id, way_type) in registry.iter() {
        constraints.excluded[id.index()] = way_type.default_excluded && !include.contains(&id);
        constraints.multipliers[id.index()] = options.speed.multiplier(way_type.icon());
    }
    for id in avoid {
        constraints.excluded[id.index()] = true;
    }
    Ok(constraints)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::way_type::WayType;

    fn registry_with_freight() -> WayTypeRegistry {
        WayTypeRegistry::with_overrides(&[WayType {
            name: "freight-elevator".to_string(),
            speed_factor: 0.8,
            transition_penalty: 30.0,
            transition_time: 60.0,
            default_excluded: true,
            icon: Some("elevator".to_string()),
            label: None,
        }])
    }

    #[test]
    fn test_default_options_exclude_nothing_builtin() {
        let registry = WayTypeRegistry::builtin();
        let constraints = resolve_options(&RouteOptions::default(), &registry).unwrap();
        assert_eq!(constraints, Constraints::unconstrained(&registry));
        assert_eq!(constraints.min_multiplier(), 1.0);
    }

    #[test]
    fn test_avoid_wins_over_include() {
        let registry = registry_with_freight();
        let freight = registry.lookup("freight-elevator").unwrap();

        let default = resolve_options(&RouteOptions::default(), &registry).unwrap();
        assert!(default.is_excluded(freight));

        let included = RouteOptions {
            include: vec!["freight-elevator".into()],
            ..Default::default()
        };
        assert!(!resolve_options(&included, &registry).unwrap().is_excluded(freight));

        let both = RouteOptions {
            avoid: vec!["freight-elevator".into()],
            include: vec!["freight-elevator".into()],
            ..Default::default()
        };
        assert!(resolve_options(&both, &registry).unwrap().is_excluded(freight));
    }

    #[test]
    fn test_unknown_way_type_is_rejected_with_suggestion() {
        let registry = WayTypeRegistry::builtin();
        let err = resolve_options(&RouteOptions::avoiding(["elevater"]), &registry).unwrap_err();
        assert!(err.to_string().contains("did you mean 'elevator'"), "{err}");
    }

    #[test]
    fn test_speed_preference_scales_costs() {
        let registry = registry_with_freight();
        let options = RouteOptions {
            speed: SpeedPreference::Accessible,
            ..Default::default()
        };
        let constraints = resolve_options(&options, &registry).unwrap();
        assert_eq!(constraints.multiplier(WayTypeId::STAIRS), 10.0);
        assert_eq!(constraints.multiplier(WayTypeId::ELEVATOR), 0.7);
        assert_eq!(constraints.multiplier(WayTypeId::WALK), 1.0);
        // Freight elevator shares the elevator icon, but is still excluded
        let freight = registry.lookup("freight-elevator").unwrap();
        assert_eq!(constraints.multiplier(freight), 0.7);
        assert_eq!(constraints.min_multiplier(), 0.7);

        let edge = Edge {
            from: 0,
            to: 1,
            way_type: WayTypeId::STAIRS,
            planar: 3.0,
            rise: 3.0,
            base_cost: 1234,
            access: 0,
            connector: None,
        };
        assert_eq!(constraints.search_cost(&edge), 12340);
    }

    #[test]
    fn test_every_multiplier_is_positive_and_finite() {
        let registry = WayTypeRegistry::builtin();
        for &speed in SpeedPreference::all() {
            let options = RouteOptions {
                speed,
                ..Default::default()
            };
            let constraints = resolve_options(&options, &registry).unwrap();
            for (id, _) in registry.iter() {
                let m = constraints.multiplier(id);
                assert!(m.is_finite() && m > 0.0, "{speed} gives {m} for {id:?}");
            }
        }
    }

    #[test]
    fn test_avoid_is_monotonic() {
        let registry = WayTypeRegistry::builtin();
        let small = resolve_options(&RouteOptions::avoiding(["stairs"]), &registry).unwrap();
        let large =
            resolve_options(&RouteOptions::avoiding(["stairs", "escalator"]), &registry).unwrap();
        for (id, _) in registry.iter() {
            assert!(!small.is_excluded(id) || large.is_excluded(id));
        }
        assert_eq!(large.excluded_names(&registry), vec!["stairs", "escalator"]);
    }

    #[test]
    fn test_parse_speed_preference() {
        assert_eq!("Accessible".parse::<SpeedPreference>().unwrap(), SpeedPreference::Accessible);
        assert!("fastest".parse::<SpeedPreference>().is_err());
    }
}
