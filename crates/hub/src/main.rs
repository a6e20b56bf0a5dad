//! Metric Hub - stateless metric ingestion, aggregation, and job dispatch
//!
//! Sits between the cost and forecast producers and the optimisation
//! agent's work queue: validates inbound reports, persists the latest cost
//! snapshot, correlates forecasts against it, and publishes threshold jobs.

use anyhow::Result;
use hub_lib::{
    health::{components, HealthRegistry},
    observability::HubMetrics,
    store::RedisStore,
    Aggregator,
};
use metric_hub::{api, config};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting metric-hub");

    let config = config::HubConfig::load()?;
    info!(redis_addr = %config.redis_addr, port = config.api_port, "Hub configured");

    let health_registry = HealthRegistry::new();
    health_registry.register(components::STORE).await;
    health_registry.register(components::EVALUATOR).await;

    let metrics = HubMetrics::new();

    let store = Arc::new(RedisStore::connect(&config.redis_addr, &config.redis_pass).await?);
    let aggregator = Aggregator::new(store, health_registry.clone(), metrics.clone());

    let app_state = Arc::new(api::AppState::new(
        aggregator,
        health_registry.clone(),
        metrics,
    ));

    // Mark the hub as ready once the store client is wired up
    health_registry.set_ready(true).await;

    api::serve(config.api_port, app_state).await
}
