//! Metrics and health monitoring
//!
//! Prometheus metrics collection plus the HTTP server exposing health and
//! metrics endpoints.

pub mod collector;
pub mod health;

pub use collector::MetricsCollector;
pub use health::{HealthServer, HealthServerConfig};
