//! HTTP contract of the query server

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use venue_route::server::api::build_router;
use venue_route::server::ServerState;
use venue_route::{RouterConfig, VenueGeometry};

fn venue(width: f64) -> Value {
    json!({
        "restrictions": ["staff"],
        "levels": [ { "id": "L0", "name": "Ground", "altitude": 0.0 } ],
        "spaces": [
            { "id": "lobby", "level": "L0", "polygon": [[0,0],[10,0],[10,10],[0,10]] },
            { "id": "backroom", "level": "L0", "polygon": [[10,0],[width,0],[width,10],[10,10]] }
        ],
        "doors": [
            { "id": "d1", "level": "L0", "segment": [[10,4],[10,6]], "access_restriction": "staff" }
        ]
    })
}

fn state() -> Arc<ServerState> {
    let config = RouterConfig::default();
    let geometry: VenueGeometry = serde_json::from_value(venue(20.0)).unwrap();
    let graph = config.graph_builder().build(&geometry, 1).unwrap();
    let (state, _worker) = ServerState::new(graph, config);
    Arc::new(state)
}

async fn call(state: &Arc<ServerState>, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };
    let response = build_router(Arc::clone(state)).oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn test_route_ok_with_access() {
    let state = state();
    let (status, body) = call(
        &state,
        "POST",
        "/route",
        Some(json!({
            "origin": { "type": "space", "id": "lobby" },
            "destination": { "type": "point", "level": "L0", "x": 15.0, "y": 5.0 },
            "access": ["staff"]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["graph_version"], 1);
    assert_eq!(body["instructions"][0]["icon"], "depart");
    assert!(body["summary"]["distance"].as_f64().unwrap() > 9.9);
    assert!(body.get("path").is_none());
}

#[tokio::test]
async fn test_route_errors_map_to_status_codes() {
    let state = state();

    let (status, body) = call(
        &state,
        "POST",
        "/route",
        Some(json!({
            "origin": { "type": "space", "id": "lobby" },
            "destination": { "type": "space", "id": "backroom" }
        })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["reason"], "restricted");

    let (status, body) = call(
        &state,
        "POST",
        "/route",
        Some(json!({
            "origin": { "type": "space", "id": "loby" },
            "destination": { "type": "space", "id": "backroom" }
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("did you mean 'lobby'"));

    let (status, _) = call(
        &state,
        "POST",
        "/route",
        Some(json!({ "origin": "nowhere" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_nearby_clusters_and_rejects_bad_zoom() {
    let state = state();
    let points = json!([
        { "id": "a", "level": "L0", "x": 0.0, "y": 0.0 },
        { "id": "b", "level": "L0", "x": 3.0, "y": 4.0 }
    ]);

    let (status, body) = call(&state, "POST", "/nearby", Some(json!({ "points": points, "zoom": 0.0 }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["count"], 2);

    let (status, _) = call(&state, "POST", "/nearby", Some(json!({ "points": points, "zoom": -3.0 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_map_update_is_applied_in_background() {
    let state = state();

    let (status, body) = call(&state, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["graph_version"], 1);

    let (status, body) = call(
        &state,
        "POST",
        "/map-updates",
        Some(json!({ "version": 2, "geometry": venue(30.0) })),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["version"], 2);

    let (status, _) = call(
        &state,
        "POST",
        "/map-updates",
        Some(json!({ "version": 2, "geometry": venue(40.0) })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    for _ in 0..200 {
        if state.store.version() == 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let (_, body) = call(&state, "GET", "/health", None).await;
    assert_eq!(body["graph_version"], 2);
    assert_eq!(body["build"]["published_version"], 2);
    assert_eq!(body["build"]["last_submitted"], 2);
}

#[tokio::test]
async fn test_swagger_document_lists_endpoints() {
    let state = state();
    let (status, body) = call(&state, "GET", "/api-docs/openapi.json", None).await;
    assert_eq!(status, StatusCode::OK);
    for path in ["/route", "/nearby", "/health", "/map-updates"] {
        assert!(body["paths"].get(path).is_some(), "missing {path}");
    }
}
