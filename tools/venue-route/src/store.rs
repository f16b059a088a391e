//! Graph store and rebuild worker
//!
//! The store holds the current [`RouteGraph`] behind an [`ArcSwap`]: readers
//! take an `Arc` and keep using it for the whole request, while the rebuild
//! worker swaps in a fresh snapshot once it is completely built.
//!
//! Map updates reach the worker through a `watch` channel, which only keeps
//! the newest value. An update submitted while a rebuild is running therefore
//! supersedes every update that has not started yet.

use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use utoipa::ToSchema;

use crate::graph::builder::GraphBuilder;
use crate::graph::RouteGraph;
use crate::venue::VenueGeometry;

/// New geometry for the venue; versions must increase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapUpdate {
    pub version: u64,
    pub geometry: VenueGeometry,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct BuildFailure {
    pub version: u64,
    pub problems: Vec<String>,
    pub failed_at_utc: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct BuildStatus {
    pub published_version: u64,
    pub published_at_utc: Option<String>,
    /// Version currently being built
    pub building: Option<u64>,
    pub last_submitted: Option<u64>,
    pub last_failure: Option<BuildFailure>,
}

/// Current snapshot plus rebuild bookkeeping
pub struct GraphStore {
    current: ArcSwap<RouteGraph>,
    status: Mutex<BuildStatus>,
}

impl GraphStore {
    pub fn new(initial: RouteGraph) -> Self {
        let status = BuildStatus {
            published_version: initial.version(),
            published_at_utc: Some(initial.info().created_at_utc.clone()),
            ..Default::default()
        };
        Self {
            current: ArcSwap::from_pointee(initial),
            status: Mutex::new(status),
        }
    }

    /// Snapshot for one request
    pub fn load(&self) -> Arc<RouteGraph> {
        self.current.load_full()
    }

    pub fn version(&self) -> u64 {
        self.current.load().version()
    }

    pub fn status(&self) -> BuildStatus {
        self.status.lock().clone()
    }

    /// Swap in `graph` unless it is not newer than the live snapshot.
    pub fn publish(&self, graph: RouteGraph) -> bool {
        let version = graph.version();
        if version <= self.version() {
            return false;
        }
        let created = graph.info().created_at_utc.clone();
        self.current.store(Arc::new(graph));

        let mut status = self.status.lock();
        status.published_version = version;
        status.published_at_utc = Some(created);
        if status.building == Some(version) {
            status.building = None;
        }
        true
    }

    fn mark_building(&self, version: u64) {
        self.status.lock().building = Some(version);
    }

    fn record_failure(&self, version: u64, problems: Vec<String>) {
        let mut status = self.status.lock();
        status.building = None;
        status.last_failure = Some(BuildFailure {
            version,
            problems,
            failed_at_utc: chrono::Utc::now().to_rfc3339(),
        });
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubmitError {
    #[error("map update version {version} does not exceed the latest submitted version {latest}")]
    Stale { version: u64, latest: u64 },
    #[error("rebuild worker has stopped")]
    Closed,
}

/// Submission side of the rebuild worker
pub struct RebuildHandle {
    tx: watch::Sender<Option<Arc<MapUpdate>>>,
    latest: Mutex<u64>,
    store: Arc<GraphStore>,
}

impl RebuildHandle {
    /// Queue `update`, replacing any update the worker has not picked up yet.
    pub fn submit(&self, update: MapUpdate) -> Result<(), SubmitError> {
        if self.tx.is_closed() {
            return Err(SubmitError::Closed);
        }
        let mut latest = self.latest.lock();
        if update.version <= *latest {
            return Err(SubmitError::Stale {
                version: update.version,
                latest: *latest,
            });
        }
        *latest = update.version;
        self.store.status.lock().last_submitted = Some(update.version);
        debug!(version = update.version, "map update queued");
        self.tx.send_replace(Some(Arc::new(update)));
        Ok(())
    }

    pub fn latest_submitted(&self) -> u64 {
        *self.latest.lock()
    }
}

/// Start the single background rebuild task.
///
/// Builds run on the blocking pool. A failed build is logged and recorded in
/// the store status; the previous snapshot stays live.
pub fn spawn_rebuild_worker(
    store: Arc<GraphStore>,
    builder: Arc<GraphBuilder>,
) -> (RebuildHandle, JoinHandle<()>) {
    let (tx, mut rx) = watch::channel::<Option<Arc<MapUpdate>>>(None);
    let handle = RebuildHandle {
        tx,
        latest: Mutex::new(store.version()),
        store: Arc::clone(&store),
    };

    let task = tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let Some(update) = rx.borrow_and_update().clone() else {
                continue;
            };
            let version = update.version;
            if version <= store.version() {
                warn!(version, published = store.version(), "skipping stale map update");
                continue;
            }

            store.mark_building(version);
            let builder = Arc::clone(&builder);
            let result =
                tokio::task::spawn_blocking(move || builder.build(&update.geometry, update.version))
                    .await;

            match result {
                Ok(Ok(graph)) => {
                    let (nodes, edges) = (graph.n_nodes(), graph.n_edges());
                    if store.publish(graph) {
                        info!(version, nodes, edges, "published route graph");
                    }
                }
                Ok(Err(e)) => {
                    error!(version, error = %e, "rebuild failed, keeping previous snapshot");
                    store.record_failure(version, e.problems().to_vec());
                }
                Err(join_error) => {
                    error!(version, error = %join_error, "rebuild task aborted");
                    store.record_failure(version, vec![join_error.to_string()]);
                }
            }
        }
        debug!("rebuild worker stopped");
    });

    (handle, task)
}
