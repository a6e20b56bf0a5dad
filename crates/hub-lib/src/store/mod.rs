//! Typed access to the shared key/value store.
//!
//! All keys are flat strings. The aggregator sees only the [`StateStore`]
//! trait and the small [`StoreError`] taxonomy; raw protocol details stay
//! inside the adapters. The adapter is always injected, never reached
//! through a module-level singleton, so tests can swap in [`MemoryStore`].

mod memory;
mod redis;

pub use memory::MemoryStore;
pub use self::redis::RedisStore;

use crate::models::{AgentJob, CostPayload};
use async_trait::async_trait;
use thiserror::Error;

/// Key holding the most recent cost snapshot.
pub const LATEST_COST_KEY: &str = "cost:latest";

/// List key the optimisation agent consumes jobs from. The hub prepends;
/// the consumer pops the opposite end, so it sees FIFO order.
pub const AGENT_QUEUE_KEY: &str = "queue:agent:jobs";

/// Cooldown key for a deployment.
pub fn cooldown_key(deployment: &str) -> String {
    format!("trigger:cooldown:{deployment}")
}

/// Store-level failures, translated from the underlying client.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("key not found: {0}")]
    NotFound(String),
    #[error("store transport failure: {0}")]
    Transport(String),
    #[error("encoding failure: {0}")]
    Encoding(String),
}

/// The four operations the hub performs against the shared store.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Overwrite the latest cost snapshot. No TTL.
    async fn set_latest_cost(&self, payload: &CostPayload) -> Result<(), StoreError>;

    /// Fetch and decode the latest cost snapshot.
    ///
    /// Returns [`StoreError::NotFound`] before the first cost ingest.
    async fn get_latest_cost(&self) -> Result<CostPayload, StoreError>;

    /// Unix-second stamp of the last cost-derived publish, if any.
    async fn get_cooldown(&self, deployment: &str) -> Result<Option<i64>, StoreError>;

    /// Record a successful publish for cooldown gating.
    async fn set_cooldown(&self, deployment: &str, unix_secs: i64) -> Result<(), StoreError>;

    /// Prepend a job to the agent work queue.
    async fn publish_job(&self, job: &AgentJob) -> Result<(), StoreError>;
}
