//! Wire-format data models shared by the ingest API, the aggregator, and
//! the published agent jobs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Absolute CPU and memory quantities. Values are amounts, not ratios.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resources {
    pub cpu_cores: f64,
    pub memory_mb: f64,
}

/// Per-deployment entry of a cost report.
///
/// `predicted_peak_24h` is absent on ingest. The aggregator populates it on
/// a copy of the snapshot entry when a forecast-derived job is published.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostDeployment {
    pub name: String,
    pub current_requests: Resources,
    pub current_usage: Resources,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub predicted_peak_24h: Option<Resources>,
}

/// Per-deployment entry of a forecast report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastDeployment {
    pub name: String,
    pub predicted_peak_24h: Resources,
}

/// Cluster-level figures attached to every cost report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterInfo {
    pub vm_count: f64,
    pub current_hourly_cost: f64,
}

/// Full report posted by the cost engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostPayload {
    pub timestamp: DateTime<Utc>,
    pub namespace: String,
    pub cluster_info: ClusterInfo,
    pub deployments: Vec<CostDeployment>,
}

/// Full report posted by the forecast service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPayload {
    pub timestamp: DateTime<Utc>,
    pub namespace: String,
    pub deployments: Vec<ForecastDeployment>,
}

/// Closed set of rule labels attached to published jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TriggerReason {
    #[serde(rename = "High Memory Waste")]
    HighMemoryWaste,
    #[serde(rename = "High Memory Risk")]
    HighMemoryRisk,
    #[serde(rename = "High CPU Waste")]
    HighCpuWaste,
    #[serde(rename = "High CPU Risk")]
    HighCpuRisk,
    #[serde(rename = "Predicted Capacity Risk (CPU)")]
    PredictedCapacityRiskCpu,
    #[serde(rename = "Predicted Safe Downscale (CPU)")]
    PredictedSafeDownscaleCpu,
    #[serde(rename = "Predicted Capacity Risk (Memory)")]
    PredictedCapacityRiskMemory,
    #[serde(rename = "Predicted Safe Downscale (Memory)")]
    PredictedSafeDownscaleMemory,
}

impl TriggerReason {
    /// Wire label for this reason.
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerReason::HighMemoryWaste => "High Memory Waste",
            TriggerReason::HighMemoryRisk => "High Memory Risk",
            TriggerReason::HighCpuWaste => "High CPU Waste",
            TriggerReason::HighCpuRisk => "High CPU Risk",
            TriggerReason::PredictedCapacityRiskCpu => "Predicted Capacity Risk (CPU)",
            TriggerReason::PredictedSafeDownscaleCpu => "Predicted Safe Downscale (CPU)",
            TriggerReason::PredictedCapacityRiskMemory => "Predicted Capacity Risk (Memory)",
            TriggerReason::PredictedSafeDownscaleMemory => "Predicted Safe Downscale (Memory)",
        }
    }

    /// True for forecast-derived reasons, which bypass cooldown gating.
    pub fn is_forecast(&self) -> bool {
        matches!(
            self,
            TriggerReason::PredictedCapacityRiskCpu
                | TriggerReason::PredictedSafeDownscaleCpu
                | TriggerReason::PredictedCapacityRiskMemory
                | TriggerReason::PredictedSafeDownscaleMemory
        )
    }
}

impl std::fmt::Display for TriggerReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Self-contained optimisation job pushed onto the agent work queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentJob {
    pub reason: TriggerReason,
    pub namespace: String,
    /// Singular by contract despite the wire name.
    #[serde(rename = "deployments")]
    pub deployment: CostDeployment,
    pub cluster_info: ClusterInfo,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_reason_wire_labels() {
        let encoded = serde_json::to_string(&TriggerReason::HighMemoryWaste).unwrap();
        assert_eq!(encoded, "\"High Memory Waste\"");

        let decoded: TriggerReason =
            serde_json::from_str("\"Predicted Capacity Risk (CPU)\"").unwrap();
        assert_eq!(decoded, TriggerReason::PredictedCapacityRiskCpu);
        assert_eq!(decoded.to_string(), "Predicted Capacity Risk (CPU)");
    }

    #[test]
    fn test_forecast_reasons_flagged() {
        assert!(TriggerReason::PredictedSafeDownscaleMemory.is_forecast());
        assert!(!TriggerReason::HighCpuRisk.is_forecast());
    }

    #[test]
    fn test_cost_payload_tolerates_provenance_fields() {
        let raw = r#"{
            "source": "cost-engine",
            "timestamp": "2025-01-01T12:00:00Z",
            "namespace": "default",
            "cluster_info": {"vm_count": 3, "current_hourly_cost": 0.12},
            "deployments": [{
                "name": "svc-a",
                "current_requests": {"cpu_cores": 0.5, "memory_mb": 512},
                "current_usage": {"cpu_cores": 0.03, "memory_mb": 110}
            }]
        }"#;

        let payload: CostPayload = serde_json::from_str(raw).unwrap();
        assert_eq!(payload.namespace, "default");
        assert_eq!(payload.deployments.len(), 1);
        assert!(payload.deployments[0].predicted_peak_24h.is_none());
    }

    #[test]
    fn test_agent_job_wire_shape() {
        let job = AgentJob {
            reason: TriggerReason::HighMemoryWaste,
            namespace: "default".to_string(),
            deployment: CostDeployment {
                name: "svc-a".to_string(),
                current_requests: Resources {
                    cpu_cores: 0.5,
                    memory_mb: 512.0,
                },
                current_usage: Resources {
                    cpu_cores: 0.03,
                    memory_mb: 110.0,
                },
                predicted_peak_24h: None,
            },
            cluster_info: ClusterInfo {
                vm_count: 3.0,
                current_hourly_cost: 0.12,
            },
        };

        let encoded = serde_json::to_value(&job).unwrap();
        assert_eq!(encoded["reason"], "High Memory Waste");
        assert!(encoded.get("deployments").is_some());
        assert!(encoded.get("deployment").is_none());
        assert!(encoded["deployments"].get("predicted_peak_24h").is_none());
    }
}
