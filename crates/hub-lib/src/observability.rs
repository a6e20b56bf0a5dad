//! Prometheus metrics for the hub.
//!
//! Ingest counters, job dispatch counters, and the background evaluation
//! latency histogram, exposed through the default registry at `/metrics`.

use prometheus::{register_histogram, register_int_counter, Histogram, IntCounter};
use std::sync::OnceLock;

/// Buckets sized for background evaluation passes (seconds).
const EVALUATION_BUCKETS: &[f64] = &[0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 2.5, 5.0, 10.0];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<HubMetricsInner> = OnceLock::new();

struct HubMetricsInner {
    cost_payloads: IntCounter,
    forecast_payloads: IntCounter,
    rejected_payloads: IntCounter,
    jobs_published: IntCounter,
    triggers_suppressed: IntCounter,
    store_errors: IntCounter,
    evaluation_seconds: Histogram,
}

impl HubMetricsInner {
    fn new() -> Self {
        Self {
            cost_payloads: register_int_counter!(
                "metric_hub_cost_payloads_total",
                "Cost payloads accepted for ingestion"
            )
            .expect("Failed to register cost_payloads_total"),

            forecast_payloads: register_int_counter!(
                "metric_hub_forecast_payloads_total",
                "Forecast payloads accepted for ingestion"
            )
            .expect("Failed to register forecast_payloads_total"),

            rejected_payloads: register_int_counter!(
                "metric_hub_rejected_payloads_total",
                "Payloads rejected at decode or validation"
            )
            .expect("Failed to register rejected_payloads_total"),

            jobs_published: register_int_counter!(
                "metric_hub_jobs_published_total",
                "Optimisation jobs pushed onto the agent queue"
            )
            .expect("Failed to register jobs_published_total"),

            triggers_suppressed: register_int_counter!(
                "metric_hub_triggers_suppressed_total",
                "Cost-derived triggers suppressed by cooldown"
            )
            .expect("Failed to register triggers_suppressed_total"),

            store_errors: register_int_counter!(
                "metric_hub_store_errors_total",
                "State store operations that failed"
            )
            .expect("Failed to register store_errors_total"),

            evaluation_seconds: register_histogram!(
                "metric_hub_evaluation_seconds",
                "Duration of background threshold evaluation passes",
                EVALUATION_BUCKETS.to_vec()
            )
            .expect("Failed to register evaluation_seconds"),
        }
    }
}

/// Lightweight handle to the global metrics instance; clones share the
/// same underlying collectors.
#[derive(Clone)]
pub struct HubMetrics {
    _private: (),
}

impl Default for HubMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl HubMetrics {
    /// Create a metrics handle, registering the collectors on first use.
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(HubMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &HubMetricsInner {
        GLOBAL_METRICS.get().expect("Metrics not initialized")
    }

    pub fn inc_cost_payloads(&self) {
        self.inner().cost_payloads.inc();
    }

    pub fn inc_forecast_payloads(&self) {
        self.inner().forecast_payloads.inc();
    }

    pub fn inc_rejected_payloads(&self) {
        self.inner().rejected_payloads.inc();
    }

    pub fn inc_jobs_published(&self) {
        self.inner().jobs_published.inc();
    }

    pub fn inc_triggers_suppressed(&self) {
        self.inner().triggers_suppressed.inc();
    }

    pub fn inc_store_errors(&self) {
        self.inner().store_errors.inc();
    }

    pub fn observe_evaluation_seconds(&self, secs: f64) {
        self.inner().evaluation_seconds.observe(secs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_handle_records() {
        // The collectors live in the process-wide default registry, so this
        // exercises registration and the recording paths.
        let metrics = HubMetrics::new();

        metrics.inc_cost_payloads();
        metrics.inc_forecast_payloads();
        metrics.inc_rejected_payloads();
        metrics.inc_jobs_published();
        metrics.inc_triggers_suppressed();
        metrics.inc_store_errors();
        metrics.observe_evaluation_seconds(0.01);
    }
}
