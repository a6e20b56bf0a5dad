//! End-to-end ingest scenarios driven through the router over the
//! in-memory store.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use hub_lib::{
    health::{components, HealthRegistry},
    models::TriggerReason,
    observability::HubMetrics,
    store::MemoryStore,
    Aggregator,
};
use metric_hub::api::{self, AppState};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

const MEMORY_WASTE_COST: &str = r#"{
  "timestamp": "2025-01-01T12:00:00Z",
  "namespace": "default",
  "cluster_info": {"vm_count": 3, "current_hourly_cost": 0.12},
  "deployments": [{
    "name": "svc-a",
    "current_requests": {"cpu_cores": 0.5, "memory_mb": 512},
    "current_usage": {"cpu_cores": 0.03, "memory_mb": 115}
  }]
}"#;

const CAPACITY_RISK_FORECAST: &str = r#"{
  "timestamp": "2025-01-01T14:00:00Z",
  "namespace": "default",
  "deployments": [{
    "name": "svc-a",
    "predicted_peak_24h": {"cpu_cores": 0.48, "memory_mb": 80}
  }]
}"#;

async fn setup() -> (Router, MemoryStore, HealthRegistry) {
    let store = MemoryStore::new();
    let health_registry = HealthRegistry::new();
    health_registry.register(components::STORE).await;
    health_registry.register(components::EVALUATOR).await;

    let metrics = HubMetrics::new();
    let aggregator = Aggregator::new(
        Arc::new(store.clone()),
        health_registry.clone(),
        metrics.clone(),
    );

    let state = Arc::new(AppState::new(
        aggregator,
        health_registry.clone(),
        metrics,
    ));
    (api::create_router(state), store, health_registry)
}

async fn post_json(app: &Router, uri: &str, body: &str) -> (StatusCode, String) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

/// Background evaluation is detached; poll until the queue settles.
async fn wait_for_queue_len(store: &MemoryStore, expected: usize) {
    for _ in 0..100 {
        if store.queue_len().await == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(store.queue_len().await, expected);
}

/// Let any in-flight background evaluation finish before asserting that
/// nothing new was published.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(100)).await;
}

#[tokio::test]
async fn test_memory_waste_cost_publishes_one_job() {
    let (app, store, _health) = setup().await;

    let (status, body) = post_json(&app, "/api/v1/metrics/cost", MEMORY_WASTE_COST).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body, "Cost payload accepted");

    wait_for_queue_len(&store, 1).await;

    let jobs = store.queued_jobs().await.unwrap();
    assert_eq!(jobs[0].reason, TriggerReason::HighMemoryWaste);
    assert_eq!(jobs[0].deployment.name, "svc-a");
    assert!(store.cooldown_stamp("svc-a").await.is_some());

    // The stored snapshot round-trips through the payload type.
    assert!(store.raw_latest_cost().await.is_some());
}

#[tokio::test]
async fn test_multi_threshold_payload_yields_single_memory_risk_job() {
    let (app, store, _health) = setup().await;

    // CPU waste is 0.95 and memory utilisation ~0.977 at the same time;
    // exactly one job comes out and memory risk wins.
    let payload = r#"{
      "timestamp": "2025-01-01T12:00:00Z",
      "namespace": "default",
      "cluster_info": {"vm_count": 3, "current_hourly_cost": 0.12},
      "deployments": [{
        "name": "svc-a",
        "current_requests": {"cpu_cores": 1.0, "memory_mb": 2048},
        "current_usage": {"cpu_cores": 0.05, "memory_mb": 2000}
      }]
    }"#;

    let (status, _) = post_json(&app, "/api/v1/metrics/cost", payload).await;
    assert_eq!(status, StatusCode::CREATED);

    wait_for_queue_len(&store, 1).await;
    settle();

    let jobs = store.queued_jobs().await.unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].reason, TriggerReason::HighMemoryRisk);
}

#[tokio::test]
async fn test_repost_within_cooldown_is_suppressed() {
    let (app, store, _health) = setup().await;

    let (status, _) = post_json(&app, "/api/v1/metrics/cost", MEMORY_WASTE_COST).await;
    assert_eq!(status, StatusCode::CREATED);
    wait_for_queue_len(&store, 1).await;

    let (status, _) = post_json(&app, "/api/v1/metrics/cost", MEMORY_WASTE_COST).await;
    assert_eq!(status, StatusCode::CREATED);
    settle();

    assert_eq!(store.queue_len().await, 1);
}

#[tokio::test]
async fn test_forecast_without_snapshot_is_rejected() {
    let (app, store, _health) = setup().await;

    let (status, body) =
        post_json(&app, "/api/v1/metrics/forecast", CAPACITY_RISK_FORECAST).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, "Failed to process forecast");

    settle();
    assert_eq!(store.queue_len().await, 0);
}

#[tokio::test]
async fn test_forecast_bypasses_active_cooldown() {
    let (app, store, _health) = setup().await;

    let (status, _) = post_json(&app, "/api/v1/metrics/cost", MEMORY_WASTE_COST).await;
    assert_eq!(status, StatusCode::CREATED);
    wait_for_queue_len(&store, 1).await;

    let stamp = store.cooldown_stamp("svc-a").await.unwrap();

    // Still inside the 30-minute window; a forecast trigger goes through
    // anyway and leaves the cost cooldown untouched.
    let (status, body) =
        post_json(&app, "/api/v1/metrics/forecast", CAPACITY_RISK_FORECAST).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body, "Forecast payload accepted");

    wait_for_queue_len(&store, 2).await;

    let jobs = store.queued_jobs().await.unwrap();
    assert_eq!(jobs[1].reason, TriggerReason::PredictedCapacityRiskCpu);
    assert_eq!(
        jobs[1].deployment.predicted_peak_24h.as_ref().unwrap().cpu_cores,
        0.48
    );
    assert_eq!(store.cooldown_stamp("svc-a").await, Some(stamp));
}

#[tokio::test]
async fn test_foreign_namespace_is_rejected_without_store_mutation() {
    let (app, store, _health) = setup().await;

    let payload = MEMORY_WASTE_COST.replace("\"default\"", "\"kube-system\"");
    let (status, body) = post_json(&app, "/api/v1/metrics/cost", &payload).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, "Invalid JSON format");

    settle();
    assert!(store.raw_latest_cost().await.is_none());
    assert_eq!(store.queue_len().await, 0);
}

#[tokio::test]
async fn test_malformed_json_is_rejected() {
    let (app, store, _health) = setup().await;

    let (status, body) = post_json(&app, "/api/v1/metrics/cost", "{not json").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, "Bad request");

    let (status, body) = post_json(&app, "/api/v1/metrics/forecast", "").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, "Bad request");

    assert!(store.raw_latest_cost().await.is_none());
}

#[tokio::test]
async fn test_missing_required_field_is_rejected() {
    let (app, _store, _health) = setup().await;

    // No cluster_info on the cost route.
    let payload = r#"{
      "timestamp": "2025-01-01T12:00:00Z",
      "namespace": "default",
      "deployments": [{
        "name": "svc-a",
        "current_requests": {"cpu_cores": 0.5, "memory_mb": 512},
        "current_usage": {"cpu_cores": 0.03, "memory_mb": 115}
      }]
    }"#;

    let (status, body) = post_json(&app, "/api/v1/metrics/cost", payload).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, "Bad request");
}

#[tokio::test]
async fn test_probe_endpoints() {
    let (app, _store, health_registry) = setup().await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/healthz")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Not ready until startup wiring flags it.
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/readyz")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    health_registry.set_ready(true).await;
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/readyz")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
