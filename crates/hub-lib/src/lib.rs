//! Core library for the metric hub
//!
//! This crate provides the pieces the ingest service is assembled from:
//! - Payload schemas and declarative validation
//! - Typed state store adapters (Redis, in-memory)
//! - Threshold evaluation, cooldown gating, and job dispatch
//! - Health checks and observability

pub mod aggregator;
pub mod health;
pub mod models;
pub mod observability;
pub mod store;
pub mod validator;

pub use aggregator::{Aggregator, IngestError};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::HubMetrics;
pub use store::{MemoryStore, RedisStore, StateStore, StoreError};
pub use validator::{Validate, ValidationError};
