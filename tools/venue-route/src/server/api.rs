//! HTTP API handlers with Axum and Utoipa

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::{OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

use crate::cluster::{cluster_points, Cluster, NearbyPoint};
use crate::describe::{Instruction, RouteSummary};
use crate::location::Location;
use crate::options::{RouteOptions, SpeedPreference};
use crate::router::{find_route, NotFoundReason, Route, RouteError, RouteRequest, Waypoint};
use crate::search::SearchLimits;
use crate::store::{BuildFailure, BuildStatus, MapUpdate, SubmitError};
use crate::venue::VenueGeometry;

use super::state::ServerState;

/// Geometry uploads can be large
const MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(route, nearby, health, map_updates),
    components(schemas(
        RouteBody,
        Route,
        Waypoint,
        Instruction,
        RouteSummary,
        Location,
        RouteOptions,
        SpeedPreference,
        NotFoundReason,
        NearbyBody,
        NearbyPoint,
        Cluster,
        HealthResponse,
        BuildStatus,
        BuildFailure,
        MapUpdateBody,
        AcceptedResponse,
        ErrorResponse
    )),
    info(
        title = "Venue Route API",
        version = "1.0.0",
        description = "Indoor multi-level routing with access restrictions and turn-by-turn instructions"
    )
)]
struct ApiDoc;

/// Build the Axum router
pub fn build_router(state: Arc<ServerState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/route", post(route))
        .route("/nearby", post(nearby))
        .route("/health", get(health))
        .route("/map-updates", post(map_updates))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::new())
        .with_state(state)
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    /// Set on 404 responses
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<NotFoundReason>,
}

fn error_response(status: StatusCode, error: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
            reason: None,
        }),
    )
        .into_response()
}

// ============ Route Endpoint ============

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RouteBody {
    pub origin: Location,
    pub destination: Location,
    /// Restriction ids granted to the caller
    #[serde(default)]
    #[schema(example = json!(["staff"]))]
    pub access: Vec<String>,
    #[serde(default)]
    pub options: RouteOptions,
    /// Overrides the configured default timeout
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

/// Find a route between two locations
#[utoipa::path(
    post,
    path = "/route",
    request_body = RouteBody,
    responses(
        (status = 200, description = "Route found", body = Route),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 404, description = "No route under the given constraints", body = ErrorResponse),
    )
)]
async fn route(
    State(state): State<Arc<ServerState>>,
    body: Result<Json<RouteBody>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => return error_response(StatusCode::BAD_REQUEST, rejection.body_text()),
    };

    let graph = state.store.load();
    let settings = state.config.router.clone();

    // Dropping this handler (client gone) cancels the search
    let cancel = CancellationToken::new();
    let _cancel_on_drop = cancel.clone().drop_guard();
    let limits = SearchLimits {
        deadline: body
            .timeout_ms
            .or(settings.default_timeout_ms)
            .map(|ms| Instant::now() + Duration::from_millis(ms)),
        cancel: Some(cancel),
    };
    let request = RouteRequest::new(body.origin, body.destination)
        .with_access(body.access)
        .with_options(body.options)
        .with_limits(limits);

    let result = tokio::task::spawn_blocking(move || find_route(&graph, &request, &settings)).await;

    match result {
        Ok(Ok(route)) => Json(route).into_response(),
        Ok(Err(RouteError::InvalidRequest(message))) => {
            error_response(StatusCode::BAD_REQUEST, message)
        }
        Ok(Err(e @ RouteError::NotFound { reason })) => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: e.to_string(),
                reason: Some(reason),
            }),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "route task failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "route computation failed")
        }
    }
}

// ============ Nearby Endpoint ============

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NearbyBody {
    pub points: Vec<NearbyPoint>,
    #[schema(example = 18.0)]
    pub zoom: f64,
}

/// Cluster points that would overlap on screen at a zoom level
#[utoipa::path(
    post,
    path = "/nearby",
    request_body = NearbyBody,
    responses(
        (status = 200, description = "Clusters in canonical order", body = Vec<Cluster>),
        (status = 400, description = "Invalid zoom or coordinates", body = ErrorResponse),
    )
)]
async fn nearby(
    State(state): State<Arc<ServerState>>,
    body: Result<Json<NearbyBody>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => return error_response(StatusCode::BAD_REQUEST, rejection.body_text()),
    };
    match cluster_points(&body.points, body.zoom, &state.config.cluster) {
        Ok(clusters) => Json(clusters).into_response(),
        Err(e) => error_response(StatusCode::BAD_REQUEST, e.to_string()),
    }
}

// ============ Health Endpoint ============

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub graph_version: u64,
    pub nodes: usize,
    pub edges: usize,
    pub levels: usize,
    pub spaces: usize,
    /// Non-fatal problems reported by the build of the live graph
    pub warnings: Vec<String>,
    pub build: BuildStatus,
}

/// Live graph and rebuild status
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Server is healthy", body = HealthResponse),
    )
)]
async fn health(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    let graph = state.store.load();
    Json(HealthResponse {
        status: "ok".to_string(),
        graph_version: graph.version(),
        nodes: graph.n_nodes(),
        edges: graph.n_edges(),
        levels: graph.levels().len(),
        spaces: graph.spaces().len(),
        warnings: graph.info().warnings.clone(),
        build: state.store.status(),
    })
}

// ============ Map Update Endpoint ============

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MapUpdateBody {
    /// Must exceed every previously submitted version
    pub version: u64,
    #[schema(value_type = Object)]
    pub geometry: VenueGeometry,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AcceptedResponse {
    pub version: u64,
    pub status: String,
}

/// Submit new venue geometry for a background rebuild
#[utoipa::path(
    post,
    path = "/map-updates",
    request_body = MapUpdateBody,
    responses(
        (status = 202, description = "Queued for rebuild", body = AcceptedResponse),
        (status = 400, description = "Malformed body", body = ErrorResponse),
        (status = 409, description = "Version not newer than the latest submitted", body = ErrorResponse),
        (status = 503, description = "Rebuild worker stopped", body = ErrorResponse),
    )
)]
async fn map_updates(
    State(state): State<Arc<ServerState>>,
    body: Result<Json<MapUpdateBody>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => return error_response(StatusCode::BAD_REQUEST, rejection.body_text()),
    };
    let version = body.version;
    let update = MapUpdate {
        version,
        geometry: body.geometry,
    };
    match state.rebuild.submit(update) {
        Ok(()) => (
            StatusCode::ACCEPTED,
            Json(AcceptedResponse {
                version,
                status: "queued".to_string(),
            }),
        )
            .into_response(),
        Err(e @ SubmitError::Stale { .. }) => error_response(StatusCode::CONFLICT, e.to_string()),
        Err(e @ SubmitError::Closed) => {
            error_response(StatusCode::SERVICE_UNAVAILABLE, e.to_string())
        }
    }
}
