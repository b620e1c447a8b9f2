//! Adapters Layer - Hexagonal Architecture Outer Ring
//!
//! Implements the port traits defined in `crate::ports` with concrete
//! external dependencies (HTTP, file I/O). Each sub-module groups
//! adapters by infrastructure concern.
//!
//! Adapter categories:
//! - `http`: rate-limited REST client shared by exchange sources
//! - `exchanges`: per-exchange `TradeSource` implementations
//! - `resolver`: pair/asset lookup caches
//! - `metrics`: Prometheus metrics export and health checks
//! - `persistence`: JSONL trade logging

pub mod exchanges;
pub mod http;
pub mod metrics;
pub mod persistence;
pub mod resolver;
