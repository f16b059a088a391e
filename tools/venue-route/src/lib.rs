//! Indoor multi-level venue routing
//!
//! Venue geometry (levels, spaces, doors, connectors, obstacles) is turned into
//! an immutable [`RouteGraph`] snapshot. Routes are searched on a snapshot under
//! the caller's access restrictions and route options, then described as
//! turn-by-turn instructions. A background worker rebuilds the graph when new
//! geometry arrives and swaps it in atomically.

pub mod cli;
pub mod cluster;
pub mod config;
pub mod describe;
pub mod graph;
pub mod location;
pub mod options;
pub mod router;
pub mod search;
pub mod server;
pub mod store;
pub mod venue;
pub mod way_type;

pub use config::RouterConfig;
pub use graph::builder::{BuildConfig, BuildError, GraphBuilder};
pub use graph::RouteGraph;
pub use location::{Location, LocationSource, RouteEndpoint};
pub use options::{RouteOptions, SpeedPreference};
pub use router::{find_route, NotFoundReason, Route, RouteError, RouteRequest, RouterSettings};
pub use store::{GraphStore, MapUpdate, RebuildHandle};
pub use venue::VenueGeometry;
