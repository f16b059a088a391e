//! Query server
//!
//! HTTP front end over the live route graph.
//!
//! # Endpoints
//!
//! - `POST /route` - Route between two locations
//! - `POST /nearby` - Cluster points for display
//! - `POST /map-updates` - Queue new geometry for a background rebuild
//! - `GET /health` - Graph version and rebuild status
//! - `GET /swagger-ui` - OpenAPI documentation

pub mod api;
pub mod state;

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::config::RouterConfig;

pub use state::ServerState;

/// Build the first graph from `geometry` and serve until the process stops
pub async fn serve(geometry: &Path, version: u64, config: RouterConfig) -> Result<()> {
    let addr = format!("{}:{}", config.server.bind, config.server.port);
    let (state, _worker) = ServerState::load(geometry, version, config).await?;
    let app = api::build_router(Arc::new(state));

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(%addr, "server listening");
    info!("Swagger UI: http://{addr}/swagger-ui/");

    axum::serve(listener, app).await?;
    Ok(())
}
