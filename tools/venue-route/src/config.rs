//! Router configuration file
//!
//! A single JSON document; every section and field is optional.
//!
//! ```json
//! {
//!   "build":   { "wall_offset": 0.3, "ramp_step": 2.0 },
//!   "router":  { "strategy": "astar", "default_timeout_ms": 500 },
//!   "cluster": { "pixel_threshold": 12 },
//!   "server":  { "port": 8080 },
//!   "way_types": [ { "name": "travelator", "speed_factor": 1.6, "icon": "escalator" } ]
//! }
//! ```

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::cluster::ClusterConfig;
use crate::graph::builder::{BuildConfig, GraphBuilder};
use crate::router::RouterSettings;
use crate::way_type::{WayType, WayTypeRegistry};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RouterConfig {
    pub build: BuildConfig,
    pub router: RouterSettings,
    pub cluster: ClusterConfig,
    pub server: ServerConfig,
    /// Replace built-in way types by name or add new ones
    pub way_types: Vec<WayType>,
}

impl RouterConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file =
            File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
        let config: RouterConfig = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        config.check()?;
        Ok(config)
    }

    /// Defaults when no path is given
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    fn check(&self) -> Result<()> {
        for way_type in &self.way_types {
            anyhow::ensure!(
                !way_type.name.trim().is_empty(),
                "way type with an empty name"
            );
            anyhow::ensure!(
                way_type.speed_factor.is_finite() && way_type.speed_factor > 0.0,
                "way type '{}' needs a positive speed_factor",
                way_type.name
            );
            anyhow::ensure!(
                way_type.transition_penalty >= 0.0 && way_type.transition_time >= 0.0,
                "way type '{}' has a negative transition penalty or time",
                way_type.name
            );
        }
        anyhow::ensure!(
            self.build.ramp_step > 0.0,
            "build.ramp_step must be positive"
        );
        anyhow::ensure!(
            self.router.describe.walking_speed > 0.0,
            "router.describe.walking_speed must be positive"
        );
        anyhow::ensure!(
            self.cluster.pixels_per_unit.is_finite() && self.cluster.pixels_per_unit > 0.0,
            "cluster.pixels_per_unit must be positive"
        );
        anyhow::ensure!(
            self.cluster.pixel_threshold.is_finite() && self.cluster.pixel_threshold >= 0.0,
            "cluster.pixel_threshold must be zero or positive"
        );
        Ok(())
    }

    pub fn way_types(&self) -> Arc<WayTypeRegistry> {
        Arc::new(WayTypeRegistry::with_overrides(&self.way_types))
    }

    pub fn graph_builder(&self) -> GraphBuilder {
        GraphBuilder::new(self.way_types(), self.build.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::SearchStrategy;
    use std::io::Write;

    #[test]
    fn test_defaults_without_file() {
        let config = RouterConfig::load_or_default(None).unwrap();
        assert_eq!(config, RouterConfig::default());
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.way_types().len(), 5);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "router": {{ "strategy": "astar", "default_timeout_ms": 500 }},
                "server": {{ "port": 9000 }},
                "way_types": [ {{ "name": "travelator", "speed_factor": 1.6, "icon": "escalator" }} ]
            }}"#
        )
        .unwrap();

        let config = RouterConfig::load(file.path()).unwrap();
        assert_eq!(config.router.strategy, SearchStrategy::AStar);
        assert_eq!(config.router.default_timeout_ms, Some(500));
        assert!(config.router.diagnose_not_found);
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.bind, "0.0.0.0");
        assert_eq!(config.build, BuildConfig::default());

        let registry = config.way_types();
        assert_eq!(registry.len(), 6);
        assert!(registry.lookup("travelator").is_some());
    }

    #[test]
    fn test_invalid_files_are_rejected() {
        let mut unknown = tempfile::NamedTempFile::new().unwrap();
        write!(unknown, r#"{{ "sever": {{ "port": 1 }} }}"#).unwrap();
        assert!(RouterConfig::load(unknown.path()).is_err());

        let mut bad_speed = tempfile::NamedTempFile::new().unwrap();
        write!(bad_speed, r#"{{ "way_types": [ {{ "name": "x", "speed_factor": 0 }} ] }}"#).unwrap();
        let err = RouterConfig::load(bad_speed.path()).unwrap_err();
        assert!(err.to_string().contains("positive speed_factor"));

        let mut negative = tempfile::NamedTempFile::new().unwrap();
        write!(negative, r#"{{ "cluster": {{ "pixel_threshold": -10 }} }}"#).unwrap();
        let err = RouterConfig::load(negative.path()).unwrap_err();
        assert!(err.to_string().contains("pixel_threshold"));

        let mut unset = RouterConfig::default();
        unset.cluster.pixel_threshold = f64::NAN;
        assert!(unset.check().is_err());
        unset.cluster.pixel_threshold = 0.0;
        assert!(unset.check().is_ok());

        let err = RouterConfig::load("/nonexistent/venue-route.json").unwrap_err();
        assert!(err.to_string().contains("Failed to open"));
    }
}
