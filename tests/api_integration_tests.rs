//! Integration Tests for the Ops Endpoints
//!
//! Tests the full request/response cycle of `/health` and `/stats`.

mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::Value;
use tower::ServiceExt;

use common::{harness, test_config, Harness};
use subtitle_gateway::{create_router, AppState};

// == Helper Functions ==

fn create_test_app(h: &Harness) -> Router {
    create_router(AppState::new(h.gateway.clone()))
}

async fn body_to_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    (status, body_to_json(response.into_body()).await)
}

// == HEALTH Endpoint Tests ==

#[tokio::test]
async fn test_health_endpoint() {
    let h = harness(test_config());
    let (status, json) = get_json(create_test_app(&h), "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["service"], "subtitle-gateway");
    assert!(json["uptime_seconds"].is_u64());
    assert_eq!(json["cache"]["l2"]["status"], "healthy");
    assert_eq!(json["rate_limiting"]["enabled"], true);
    assert_eq!(json["rate_limiting"]["window"], 60);
}

#[tokio::test]
async fn test_health_without_l2() {
    let h = common::harness_with_l2(test_config(), None);
    let (status, json) = get_json(create_test_app(&h), "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["cache"]["l2"]["status"], "disabled");
}

// == STATS Endpoint Tests ==

#[tokio::test]
async fn test_stats_endpoint_reflects_traffic() {
    let h = harness(test_config());
    let request = subtitle_gateway::models::SubtitleRequest::new("dQw4w9WgXcQ");

    h.gateway.fetch_one("a", request.clone()).await.unwrap();
    h.gateway.fetch_one("a", request.clone()).await.unwrap();
    h.coordinator.clear_memory().await;
    h.gateway.fetch_one("b", request).await.unwrap();

    let (status, json) = get_json(create_test_app(&h), "/stats").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["cache"]["misses"], 1);
    assert_eq!(json["cache"]["l1_hits"], 1);
    assert_eq!(json["cache"]["l2_hits"], 1);
    assert_eq!(json["cache"]["l1_size"], 1);
    assert_eq!(json["cache"]["memory_backend"], "memory");
    assert_eq!(json["rate_limiter"]["admitted"], 3);
    assert_eq!(json["rate_limiter"]["tracked_windows"], 2);
    assert_eq!(json["batch_max_items"], 10);
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let h = harness(test_config());
    let response = create_test_app(&h)
        .oneshot(Request::builder().uri("/subtitles").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// == Live Server ==

#[tokio::test]
async fn test_live_server_round_trip() {
    let h = harness(test_config());
    let app = create_test_app(&h);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let health: Value = reqwest::get(format!("http://{addr}/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "healthy");

    let response = reqwest::get(format!("http://{addr}/stats")).await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    server.abort();
}
