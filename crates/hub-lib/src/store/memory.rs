//! In-memory store adapter.
//!
//! Backs the test suites and store-less local runs. State is held as the
//! same JSON strings the Redis adapter would write, so snapshot round-trip
//! behaviour matches the production path.

use super::{StateStore, StoreError, LATEST_COST_KEY};
use crate::models::{AgentJob, CostPayload};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Shared in-memory state; clones are handles onto the same maps.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<MemoryState>>,
}

#[derive(Default)]
struct MemoryState {
    latest_cost: Option<String>,
    cooldowns: HashMap<String, i64>,
    /// Index 0 is the queue head (most recent push).
    queue: Vec<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of jobs currently queued.
    pub async fn queue_len(&self) -> usize {
        self.inner.read().await.queue.len()
    }

    /// Queued jobs in consumer order (oldest first).
    pub async fn queued_jobs(&self) -> Result<Vec<AgentJob>, StoreError> {
        self.inner
            .read()
            .await
            .queue
            .iter()
            .rev()
            .map(|raw| serde_json::from_str(raw).map_err(|e| StoreError::Encoding(e.to_string())))
            .collect()
    }

    /// Raw snapshot bytes, if a cost payload has been stored.
    pub async fn raw_latest_cost(&self) -> Option<String> {
        self.inner.read().await.latest_cost.clone()
    }

    /// Current cooldown stamp for a deployment.
    pub async fn cooldown_stamp(&self, deployment: &str) -> Option<i64> {
        self.inner.read().await.cooldowns.get(deployment).copied()
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn set_latest_cost(&self, payload: &CostPayload) -> Result<(), StoreError> {
        let encoded =
            serde_json::to_string(payload).map_err(|e| StoreError::Encoding(e.to_string()))?;
        self.inner.write().await.latest_cost = Some(encoded);
        Ok(())
    }

    async fn get_latest_cost(&self) -> Result<CostPayload, StoreError> {
        let state = self.inner.read().await;
        let raw = state
            .latest_cost
            .as_deref()
            .ok_or_else(|| StoreError::NotFound(LATEST_COST_KEY.to_string()))?;
        serde_json::from_str(raw).map_err(|e| StoreError::Encoding(e.to_string()))
    }

    async fn get_cooldown(&self, deployment: &str) -> Result<Option<i64>, StoreError> {
        Ok(self.inner.read().await.cooldowns.get(deployment).copied())
    }

    async fn set_cooldown(&self, deployment: &str, unix_secs: i64) -> Result<(), StoreError> {
        self.inner
            .write()
            .await
            .cooldowns
            .insert(deployment.to_string(), unix_secs);
        Ok(())
    }

    async fn publish_job(&self, job: &AgentJob) -> Result<(), StoreError> {
        let encoded =
            serde_json::to_string(job).map_err(|e| StoreError::Encoding(e.to_string()))?;
        self.inner.write().await.queue.insert(0, encoded);
        Ok(())
    }
}
