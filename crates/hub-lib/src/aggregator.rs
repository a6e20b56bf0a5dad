//! Stream merge, threshold evaluation, cooldown gating, and job dispatch.
//!
//! Cost ingest persists the snapshot and evaluates utilisation thresholds
//! in the background; forecast ingest correlates predictions against the
//! stored snapshot. Evaluation runs on detached tasks bounded by a
//! deadline, so ingest calls acknowledge without waiting.

use crate::health::{components, HealthRegistry};
use crate::models::{
    AgentJob, ClusterInfo, CostDeployment, CostPayload, ForecastDeployment, ForecastPayload,
    TriggerReason,
};
use crate::observability::HubMetrics;
use crate::store::{StateStore, StoreError};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Waste ratio above which a deployment is flagged for downsizing.
const WASTE_THRESHOLD: f64 = 0.50;
/// Utilisation ratio above which a deployment is flagged as at risk.
const UTILISATION_THRESHOLD: f64 = 0.85;
/// Predicted peak above this fraction of the request is a capacity risk.
const FORECAST_CAPACITY_RATIO: f64 = 0.9;
/// Current waste ratio required before a downscale is suggested.
const FORECAST_DOWNSCALE_WASTE: f64 = 0.40;
/// Predicted peak below this fraction of the request makes downscaling safe.
const FORECAST_DOWNSCALE_RATIO: f64 = 0.6;

/// Minimum interval between cost-derived jobs for one deployment.
const DEFAULT_COOLDOWN: Duration = Duration::from_secs(30 * 60);
/// Budget for one background evaluation pass.
const DEFAULT_EVAL_DEADLINE: Duration = Duration::from_secs(10);

/// Ingest-time failures surfaced to the HTTP layer. Anything that happens
/// after the background task is spawned is observable only via logs and
/// metrics.
#[derive(Debug, Error)]
pub enum IngestError {
    /// A forecast arrived before any cost snapshot was stored.
    #[error("cost snapshot absent")]
    SnapshotAbsent,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Correlates the two producer streams and dispatches agent jobs.
///
/// Holds no per-request state of its own; everything shared lives in the
/// injected store, so replicas converge.
#[derive(Clone)]
pub struct Aggregator {
    store: Arc<dyn StateStore>,
    health: HealthRegistry,
    metrics: HubMetrics,
    cooldown: Duration,
    eval_deadline: Duration,
}

impl Aggregator {
    pub fn new(store: Arc<dyn StateStore>, health: HealthRegistry, metrics: HubMetrics) -> Self {
        Self {
            store,
            health,
            metrics,
            cooldown: DEFAULT_COOLDOWN,
            eval_deadline: DEFAULT_EVAL_DEADLINE,
        }
    }

    /// Override the cooldown window.
    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    /// Override the evaluation deadline.
    pub fn with_eval_deadline(mut self, deadline: Duration) -> Self {
        self.eval_deadline = deadline;
        self
    }

    /// Persist the snapshot, then evaluate thresholds in the background.
    ///
    /// Returns as soon as the snapshot write succeeds. The spawned task is
    /// detached; its outcome shows up on the queue, in metrics, and in logs.
    pub async fn on_cost(&self, payload: CostPayload) -> Result<(), IngestError> {
        if let Err(err) = self.store.set_latest_cost(&payload).await {
            self.health
                .set_unhealthy(components::STORE, err.to_string())
                .await;
            self.metrics.inc_store_errors();
            return Err(err.into());
        }
        self.health.set_healthy(components::STORE).await;

        let aggregator = self.clone();
        tokio::spawn(async move {
            let deadline = Instant::now() + aggregator.eval_deadline;
            aggregator.evaluate_cost(payload, deadline).await;
        });

        Ok(())
    }

    /// Fetch the snapshot, then correlate the forecast in the background.
    ///
    /// Forecasts are meaningless without a snapshot, so an empty store is an
    /// ingest error rather than a deferred evaluation.
    pub async fn on_forecast(&self, payload: ForecastPayload) -> Result<(), IngestError> {
        let snapshot = match self.store.get_latest_cost().await {
            Ok(snapshot) => snapshot,
            Err(StoreError::NotFound(_)) => return Err(IngestError::SnapshotAbsent),
            Err(err) => {
                self.health
                    .set_unhealthy(components::STORE, err.to_string())
                    .await;
                self.metrics.inc_store_errors();
                return Err(err.into());
            }
        };
        self.health.set_healthy(components::STORE).await;

        let aggregator = self.clone();
        tokio::spawn(async move {
            let deadline = Instant::now() + aggregator.eval_deadline;
            aggregator.evaluate_forecast(payload, snapshot, deadline).await;
        });

        Ok(())
    }

    /// Cost-threshold pass over a payload, in payload order.
    ///
    /// The deadline is checked at the top of each iteration: on expiry,
    /// already-published jobs are retained and the remainder is dropped.
    pub async fn evaluate_cost(&self, payload: CostPayload, deadline: Instant) {
        let started = Instant::now();
        info!(
            deployments = payload.deployments.len(),
            "Starting cost threshold evaluation"
        );

        for deployment in &payload.deployments {
            if Instant::now() >= deadline {
                warn!(
                    deployment = %deployment.name,
                    "Evaluation deadline exceeded, dropping remaining deployments"
                );
                self.health
                    .set_degraded(components::EVALUATOR, "evaluation deadline exceeded")
                    .await;
                break;
            }

            let Some(reason) = cost_trigger(deployment) else {
                continue;
            };
            self.gate_and_publish(deployment, reason, &payload.namespace, &payload.cluster_info)
                .await;
        }

        self.metrics
            .observe_evaluation_seconds(started.elapsed().as_secs_f64());
    }

    /// Forecast pass: correlate entries against the snapshot by name.
    pub async fn evaluate_forecast(
        &self,
        payload: ForecastPayload,
        snapshot: CostPayload,
        deadline: Instant,
    ) {
        let started = Instant::now();
        let by_name: HashMap<&str, &CostDeployment> = snapshot
            .deployments
            .iter()
            .map(|d| (d.name.as_str(), d))
            .collect();

        info!(
            deployments = payload.deployments.len(),
            "Starting forecast correlation"
        );

        for forecast in &payload.deployments {
            if Instant::now() >= deadline {
                warn!(
                    deployment = %forecast.name,
                    "Evaluation deadline exceeded, dropping remaining deployments"
                );
                self.health
                    .set_degraded(components::EVALUATOR, "evaluation deadline exceeded")
                    .await;
                break;
            }

            let Some(cost) = by_name.get(forecast.name.as_str()) else {
                info!(
                    deployment = %forecast.name,
                    "No snapshot entry for forecast deployment, skipping"
                );
                continue;
            };
            let Some(reason) = forecast_trigger(forecast, cost) else {
                continue;
            };

            // Forecast triggers bypass the cost cooldown entirely: no read,
            // no stamp update. The published deployment is a copy of the
            // snapshot entry with the prediction filled in.
            let mut deployment = (*cost).clone();
            deployment.predicted_peak_24h = Some(forecast.predicted_peak_24h.clone());
            self.publish(deployment, reason, &snapshot.namespace, &snapshot.cluster_info)
                .await;
        }

        self.metrics
            .observe_evaluation_seconds(started.elapsed().as_secs_f64());
    }

    /// Cooldown gate for cost-derived triggers. The stamp is written only
    /// after a successful publish.
    async fn gate_and_publish(
        &self,
        deployment: &CostDeployment,
        reason: TriggerReason,
        namespace: &str,
        cluster_info: &ClusterInfo,
    ) {
        let last = match self.store.get_cooldown(&deployment.name).await {
            Ok(last) => last,
            Err(err) => {
                warn!(
                    deployment = %deployment.name,
                    error = %err,
                    "Failed to read cooldown, skipping trigger"
                );
                self.metrics.inc_store_errors();
                return;
            }
        };

        let now = Utc::now().timestamp();
        if let Some(last) = last {
            if now - last < self.cooldown.as_secs() as i64 {
                debug!(
                    deployment = %deployment.name,
                    reason = %reason,
                    last_publish = last,
                    "Cooldown active, suppressing trigger"
                );
                self.metrics.inc_triggers_suppressed();
                return;
            }
        }

        if self
            .publish(deployment.clone(), reason, namespace, cluster_info)
            .await
        {
            if let Err(err) = self.store.set_cooldown(&deployment.name, now).await {
                warn!(
                    deployment = %deployment.name,
                    error = %err,
                    "Failed to record cooldown stamp"
                );
                self.metrics.inc_store_errors();
            }
        }
    }

    /// Push a job onto the agent queue. Returns whether the push succeeded.
    async fn publish(
        &self,
        deployment: CostDeployment,
        reason: TriggerReason,
        namespace: &str,
        cluster_info: &ClusterInfo,
    ) -> bool {
        info!(
            deployment = %deployment.name,
            reason = %reason,
            "Publishing optimisation job"
        );

        let job = AgentJob {
            reason,
            namespace: namespace.to_string(),
            deployment,
            cluster_info: cluster_info.clone(),
        };

        match self.store.publish_job(&job).await {
            Ok(()) => {
                self.metrics.inc_jobs_published();
                true
            }
            Err(err) => {
                error!(
                    deployment = %job.deployment.name,
                    error = %err,
                    "Failed to publish job"
                );
                self.metrics.inc_store_errors();
                false
            }
        }
    }
}

/// Cost priority chain: at most one reason per deployment per evaluation,
/// first match wins. Memory precedes CPU, waste precedes risk. Deployments
/// with a zero CPU or memory request are skipped; no meaningful ratio
/// exists for them.
pub fn cost_trigger(deployment: &CostDeployment) -> Option<TriggerReason> {
    let requests = &deployment.current_requests;
    let usage = &deployment.current_usage;

    if requests.cpu_cores == 0.0 || requests.memory_mb == 0.0 {
        return None;
    }

    let waste_cpu = (requests.cpu_cores - usage.cpu_cores) / requests.cpu_cores;
    let util_cpu = usage.cpu_cores / requests.cpu_cores;
    let waste_mem = (requests.memory_mb - usage.memory_mb) / requests.memory_mb;
    let util_mem = usage.memory_mb / requests.memory_mb;

    if waste_mem > WASTE_THRESHOLD {
        Some(TriggerReason::HighMemoryWaste)
    } else if util_mem > UTILISATION_THRESHOLD {
        Some(TriggerReason::HighMemoryRisk)
    } else if waste_cpu > WASTE_THRESHOLD {
        Some(TriggerReason::HighCpuWaste)
    } else if util_cpu > UTILISATION_THRESHOLD {
        Some(TriggerReason::HighCpuRisk)
    } else {
        None
    }
}

/// Forecast rules against the matching snapshot entry. The CPU branch runs
/// first; memory is consulted only when CPU produced nothing.
pub fn forecast_trigger(
    forecast: &ForecastDeployment,
    cost: &CostDeployment,
) -> Option<TriggerReason> {
    let requests = &cost.current_requests;
    let usage = &cost.current_usage;
    let predicted = &forecast.predicted_peak_24h;

    if requests.cpu_cores > 0.0 {
        let capacity_risk = predicted.cpu_cores > requests.cpu_cores * FORECAST_CAPACITY_RATIO;
        let current_waste = (requests.cpu_cores - usage.cpu_cores) / requests.cpu_cores;
        let safe_downscale = current_waste > FORECAST_DOWNSCALE_WASTE
            && predicted.cpu_cores < requests.cpu_cores * FORECAST_DOWNSCALE_RATIO;

        if capacity_risk {
            return Some(TriggerReason::PredictedCapacityRiskCpu);
        }
        if safe_downscale {
            return Some(TriggerReason::PredictedSafeDownscaleCpu);
        }
    }

    if requests.memory_mb > 0.0 {
        let capacity_risk = predicted.memory_mb > requests.memory_mb * FORECAST_CAPACITY_RATIO;
        let current_waste = (requests.memory_mb - usage.memory_mb) / requests.memory_mb;
        let safe_downscale = current_waste > FORECAST_DOWNSCALE_WASTE
            && predicted.memory_mb < requests.memory_mb * FORECAST_DOWNSCALE_RATIO;

        if capacity_risk {
            return Some(TriggerReason::PredictedCapacityRiskMemory);
        }
        if safe_downscale {
            return Some(TriggerReason::PredictedSafeDownscaleMemory);
        }
    }

    None
}
