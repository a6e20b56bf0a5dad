//! Component health tracking for liveness and readiness probes.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Health of a single tracked component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Healthy,
    /// Still serving, but something needs attention (e.g. a background
    /// evaluation blew its deadline).
    Degraded,
    Unhealthy,
}

impl ComponentStatus {
    pub fn is_operational(&self) -> bool {
        !matches!(self, ComponentStatus::Unhealthy)
    }
}

fn worse(a: ComponentStatus, b: ComponentStatus) -> ComponentStatus {
    fn rank(status: ComponentStatus) -> u8 {
        match status {
            ComponentStatus::Healthy => 0,
            ComponentStatus::Degraded => 1,
            ComponentStatus::Unhealthy => 2,
        }
    }
    if rank(b) > rank(a) {
        b
    } else {
        a
    }
}

/// Last observed state of a component.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub observed_at: i64,
}

impl ComponentHealth {
    fn observed(status: ComponentStatus, detail: Option<String>) -> Self {
        Self {
            status,
            detail,
            observed_at: chrono::Utc::now().timestamp(),
        }
    }
}

/// Names of the tracked components.
pub mod components {
    pub const STORE: &str = "store";
    pub const EVALUATOR: &str = "evaluator";
}

/// Aggregate liveness response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: ComponentStatus,
    pub components: HashMap<String, ComponentHealth>,
}

/// Readiness response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Shared registry of component health; clones are handles onto the same
/// state.
#[derive(Debug, Clone, Default)]
pub struct HealthRegistry {
    components: Arc<RwLock<HashMap<String, ComponentHealth>>>,
    ready: Arc<RwLock<bool>>,
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a component, starting healthy.
    pub async fn register(&self, name: &str) {
        self.update(name, ComponentStatus::Healthy, None).await;
    }

    pub async fn set_healthy(&self, name: &str) {
        self.update(name, ComponentStatus::Healthy, None).await;
    }

    pub async fn set_degraded(&self, name: &str, detail: impl Into<String>) {
        self.update(name, ComponentStatus::Degraded, Some(detail.into()))
            .await;
    }

    pub async fn set_unhealthy(&self, name: &str, detail: impl Into<String>) {
        self.update(name, ComponentStatus::Unhealthy, Some(detail.into()))
            .await;
    }

    async fn update(&self, name: &str, status: ComponentStatus, detail: Option<String>) {
        self.components
            .write()
            .await
            .insert(name.to_string(), ComponentHealth::observed(status, detail));
    }

    /// Flip readiness once startup wiring is complete.
    pub async fn set_ready(&self, ready: bool) {
        *self.ready.write().await = ready;
    }

    /// Aggregate health: the worst component status wins.
    pub async fn health(&self) -> HealthResponse {
        let components = self.components.read().await.clone();
        let status = components
            .values()
            .map(|c| c.status)
            .fold(ComponentStatus::Healthy, worse);
        HealthResponse { status, components }
    }

    pub async fn readiness(&self) -> ReadinessResponse {
        if !*self.ready.read().await {
            return ReadinessResponse {
                ready: false,
                reason: Some("hub not yet initialised".to_string()),
            };
        }

        let health = self.health().await;
        if health.status.is_operational() {
            ReadinessResponse {
                ready: true,
                reason: None,
            }
        } else {
            ReadinessResponse {
                ready: false,
                reason: Some("component unhealthy".to_string()),
            }
        }
    }
}
