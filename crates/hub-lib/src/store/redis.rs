//! Redis-backed store adapter.

use super::{cooldown_key, StateStore, StoreError, AGENT_QUEUE_KEY, LATEST_COST_KEY};
use crate::models::{AgentJob, CostPayload};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::info;

/// Store adapter over the shared Redis instance.
///
/// Holds a [`ConnectionManager`], which multiplexes requests and reconnects
/// on its own; clones are cheap handles onto the same connection.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    /// Connect using the service address (`host:port`) and password.
    /// An empty password means auth is disabled.
    pub async fn connect(addr: &str, password: &str) -> Result<Self, StoreError> {
        let url = if password.is_empty() {
            format!("redis://{addr}/")
        } else {
            format!("redis://:{password}@{addr}/")
        };

        let client =
            redis::Client::open(url).map_err(|e| StoreError::Transport(e.to_string()))?;
        let conn = client
            .get_connection_manager()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        info!(addr = %addr, "Connected to state store");
        Ok(Self { conn })
    }
}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        StoreError::Transport(err.to_string())
    }
}

#[async_trait]
impl StateStore for RedisStore {
    async fn set_latest_cost(&self, payload: &CostPayload) -> Result<(), StoreError> {
        let encoded =
            serde_json::to_string(payload).map_err(|e| StoreError::Encoding(e.to_string()))?;
        let mut conn = self.conn.clone();
        conn.set::<_, _, ()>(LATEST_COST_KEY, encoded).await?;
        Ok(())
    }

    async fn get_latest_cost(&self) -> Result<CostPayload, StoreError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(LATEST_COST_KEY).await?;
        let raw = raw.ok_or_else(|| StoreError::NotFound(LATEST_COST_KEY.to_string()))?;
        serde_json::from_str(&raw).map_err(|e| StoreError::Encoding(e.to_string()))
    }

    async fn get_cooldown(&self, deployment: &str) -> Result<Option<i64>, StoreError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(cooldown_key(deployment)).await?;
        match raw {
            None => Ok(None),
            Some(raw) => raw
                .parse::<i64>()
                .map(Some)
                .map_err(|e| StoreError::Encoding(format!("cooldown stamp: {e}"))),
        }
    }

    async fn set_cooldown(&self, deployment: &str, unix_secs: i64) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        conn.set::<_, _, ()>(cooldown_key(deployment), unix_secs.to_string())
            .await?;
        Ok(())
    }

    async fn publish_job(&self, job: &AgentJob) -> Result<(), StoreError> {
        let encoded =
            serde_json::to_string(job).map_err(|e| StoreError::Encoding(e.to_string()))?;
        let mut conn = self.conn.clone();
        conn.lpush::<_, _, ()>(AGENT_QUEUE_KEY, encoded).await?;
        Ok(())
    }
}
