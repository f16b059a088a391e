//! Server state - the live graph store plus the rebuild handle

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::task::JoinHandle;
use tracing::info;

use crate::config::RouterConfig;
use crate::graph::RouteGraph;
use crate::store::{spawn_rebuild_worker, GraphStore, RebuildHandle};
use crate::venue::VenueGeometry;

/// Shared by every request handler
pub struct ServerState {
    pub store: Arc<GraphStore>,
    pub rebuild: RebuildHandle,
    pub config: RouterConfig,
}

impl ServerState {
    /// Wrap an already built graph and start the rebuild worker.
    ///
    /// Must be called inside a tokio runtime.
    pub fn new(graph: RouteGraph, config: RouterConfig) -> (Self, JoinHandle<()>) {
        let store = Arc::new(GraphStore::new(graph));
        let builder = Arc::new(config.graph_builder());
        let (rebuild, worker) = spawn_rebuild_worker(Arc::clone(&store), builder);
        let state = Self {
            store,
            rebuild,
            config,
        };
        (state, worker)
    }

    /// Build the first snapshot from `geometry`; a failure here is fatal.
    pub async fn load(geometry: &Path, version: u64, config: RouterConfig) -> Result<(Self, JoinHandle<()>)> {
        let venue = VenueGeometry::from_path(geometry)
            .with_context(|| format!("Failed to read geometry {}", geometry.display()))?;
        let builder = config.graph_builder();
        let graph = tokio::task::spawn_blocking(move || builder.build(&venue, version))
            .await
            .context("Initial graph build was aborted")?
            .context("Initial graph build failed")?;
        info!(
            version,
            nodes = graph.n_nodes(),
            edges = graph.n_edges(),
            warnings = graph.info().warnings.len(),
            "initial route graph ready"
        );
        Ok(Self::new(graph, config))
    }
}
