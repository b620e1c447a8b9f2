//! Metrics and Monitoring Adapters
//!
//! Prometheus export on /metrics plus /live and /ready probes, both
//! served by axum 0.7.

pub mod health;
pub mod prometheus;

pub use health::{HealthServer, HealthState};
pub use prometheus::MetricsRegistry;
