//! Hub configuration

use anyhow::Result;
use serde::Deserialize;

/// Service configuration, sourced from the environment.
#[derive(Debug, Clone, Deserialize)]
pub struct HubConfig {
    /// State store address (`host:port`)
    #[serde(default = "default_redis_addr")]
    pub redis_addr: String,

    /// State store password; empty when auth is disabled
    #[serde(default = "default_redis_pass")]
    pub redis_pass: String,

    /// Ingest API port
    #[serde(default = "default_api_port")]
    pub api_port: u16,
}

fn default_redis_addr() -> String {
    std::env::var("REDIS_SERVICE_ADDR").unwrap_or_else(|_| "127.0.0.1:6379".to_string())
}

fn default_redis_pass() -> String {
    std::env::var("REDIS_SERVICE_PASS").unwrap_or_default()
}

fn default_api_port() -> u16 {
    8008
}

impl HubConfig {
    /// Load configuration from the environment.
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("HUB"))
            .build()?;

        Ok(config.try_deserialize().unwrap_or_else(|_| HubConfig {
            redis_addr: default_redis_addr(),
            redis_pass: default_redis_pass(),
            api_port: default_api_port(),
        }))
    }
}
