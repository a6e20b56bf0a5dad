//! Declarative payload validation.
//!
//! Structural presence is enforced by serde at decode time; the rules here
//! cover the semantic constraints: the single accepted namespace, positive
//! cluster figures, non-negative resource values, and non-empty deployment
//! lists. Validation has no side effects.

use crate::models::{CostDeployment, CostPayload, ForecastPayload, Resources};
use thiserror::Error;

/// The only namespace the hub accepts.
pub const ACCEPTED_NAMESPACE: &str = "default";

/// Validation failure naming every offending field by dotted path.
#[derive(Debug, Error)]
#[error("invalid payload: {}", .issues.join("; "))]
pub struct ValidationError {
    pub issues: Vec<String>,
}

/// Semantic validation over a decoded payload.
pub trait Validate {
    fn validate(&self) -> Result<(), ValidationError>;
}

#[derive(Debug, Default)]
struct Issues(Vec<String>);

impl Issues {
    fn push(&mut self, field: &str, problem: &str) {
        self.0.push(format!("{field}: {problem}"));
    }

    fn require_positive(&mut self, field: &str, value: f64) {
        if !value.is_finite() || value <= 0.0 {
            self.push(field, "must be greater than zero");
        }
    }

    fn require_non_negative(&mut self, field: &str, value: f64) {
        if !value.is_finite() || value < 0.0 {
            self.push(field, "must not be negative");
        }
    }

    fn require_non_empty(&mut self, field: &str, value: &str) {
        if value.is_empty() {
            self.push(field, "must not be empty");
        }
    }

    fn require_namespace(&mut self, namespace: &str) {
        if namespace != ACCEPTED_NAMESPACE {
            self.push("namespace", "must equal \"default\"");
        }
    }

    fn into_result(self) -> Result<(), ValidationError> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues: self.0 })
        }
    }
}

fn check_resources(resources: &Resources, path: &str, issues: &mut Issues) {
    issues.require_non_negative(&format!("{path}.cpu_cores"), resources.cpu_cores);
    issues.require_non_negative(&format!("{path}.memory_mb"), resources.memory_mb);
}

fn check_cost_deployment(deployment: &CostDeployment, path: &str, issues: &mut Issues) {
    issues.require_non_empty(&format!("{path}.name"), &deployment.name);
    check_resources(
        &deployment.current_requests,
        &format!("{path}.current_requests"),
        issues,
    );
    check_resources(
        &deployment.current_usage,
        &format!("{path}.current_usage"),
        issues,
    );
    if let Some(predicted) = &deployment.predicted_peak_24h {
        check_resources(predicted, &format!("{path}.predicted_peak_24h"), issues);
    }
}

impl Validate for CostPayload {
    fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = Issues::default();
        issues.require_namespace(&self.namespace);

        issues.require_positive("cluster_info.vm_count", self.cluster_info.vm_count);
        if self.cluster_info.vm_count.is_finite() && self.cluster_info.vm_count.fract() != 0.0 {
            issues.push("cluster_info.vm_count", "must be a whole number");
        }
        issues.require_positive(
            "cluster_info.current_hourly_cost",
            self.cluster_info.current_hourly_cost,
        );

        if self.deployments.is_empty() {
            issues.push("deployments", "must contain at least one element");
        }
        for (i, deployment) in self.deployments.iter().enumerate() {
            check_cost_deployment(deployment, &format!("deployments[{i}]"), &mut issues);
        }

        issues.into_result()
    }
}

impl Validate for ForecastPayload {
    fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = Issues::default();
        issues.require_namespace(&self.namespace);

        if self.deployments.is_empty() {
            issues.push("deployments", "must contain at least one element");
        }
        for (i, deployment) in self.deployments.iter().enumerate() {
            let path = format!("deployments[{i}]");
            issues.require_non_empty(&format!("{path}.name"), &deployment.name);
            check_resources(
                &deployment.predicted_peak_24h,
                &format!("{path}.predicted_peak_24h"),
                &mut issues,
            );
        }

        issues.into_result()
    }
}
