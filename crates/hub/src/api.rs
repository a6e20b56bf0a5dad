//! HTTP front-end: metric ingestion routes and probe endpoints.
//!
//! The ingest handlers decode, validate, and hand off to the aggregator,
//! then fast-ack with 201. Threshold evaluation happens after the response
//! is written; its failures are observable only via logs and metrics.

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use hub_lib::{
    health::HealthRegistry,
    models::{CostPayload, ForecastPayload},
    observability::HubMetrics,
    Aggregator, Validate,
};
use prometheus::{Encoder, TextEncoder};
use std::sync::Arc;
use tracing::{info, warn};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub aggregator: Aggregator,
    pub health_registry: HealthRegistry,
    pub metrics: HubMetrics,
}

impl AppState {
    pub fn new(
        aggregator: Aggregator,
        health_registry: HealthRegistry,
        metrics: HubMetrics,
    ) -> Self {
        Self {
            aggregator,
            health_registry,
            metrics,
        }
    }
}

/// Cost ingest: decode, validate, persist snapshot, fast-ack.
async fn ingest_cost(State(state): State<Arc<AppState>>, body: Bytes) -> impl IntoResponse {
    let payload: CostPayload = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(err) => {
            warn!(error = %err, "Rejected cost payload: malformed JSON");
            state.metrics.inc_rejected_payloads();
            return (StatusCode::BAD_REQUEST, "Bad request");
        }
    };

    if let Err(err) = payload.validate() {
        warn!(error = %err, "Rejected cost payload: validation failed");
        state.metrics.inc_rejected_payloads();
        return (StatusCode::BAD_REQUEST, "Invalid JSON format");
    }

    match state.aggregator.on_cost(payload).await {
        Ok(()) => {
            info!("Accepted cost payload");
            state.metrics.inc_cost_payloads();
            (StatusCode::CREATED, "Cost payload accepted")
        }
        Err(err) => {
            warn!(error = %err, "Failed to persist cost snapshot");
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to save")
        }
    }
}

/// Forecast ingest: decode, validate, correlate against the snapshot.
async fn ingest_forecast(State(state): State<Arc<AppState>>, body: Bytes) -> impl IntoResponse {
    let payload: ForecastPayload = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(err) => {
            warn!(error = %err, "Rejected forecast payload: malformed JSON");
            state.metrics.inc_rejected_payloads();
            return (StatusCode::BAD_REQUEST, "Bad request");
        }
    };

    if let Err(err) = payload.validate() {
        warn!(error = %err, "Rejected forecast payload: validation failed");
        state.metrics.inc_rejected_payloads();
        return (StatusCode::BAD_REQUEST, "Invalid JSON format");
    }

    match state.aggregator.on_forecast(payload).await {
        Ok(()) => {
            info!("Accepted forecast payload");
            state.metrics.inc_forecast_payloads();
            (StatusCode::CREATED, "Forecast payload accepted")
        }
        Err(err) => {
            warn!(error = %err, "Failed to schedule forecast correlation");
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to process forecast")
        }
    }
}

/// Liveness probe - 200 while operational, 503 once a component fails
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = if health.status.is_operational() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(health))
}

/// Readiness probe
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        warn!(error = %err, "Failed to encode metrics");
        return (StatusCode::INTERNAL_SERVER_ERROR, Vec::new()).into_response();
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
        .into_response()
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/metrics/cost", post(ingest_cost))
        .route("/api/v1/metrics/forecast", post(ingest_forecast))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Start the API server
pub async fn serve(port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting metric hub API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
