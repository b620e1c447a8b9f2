//! Exchange REST Transport
//!
//! Shared HTTP plumbing for polling-based exchange sources.

pub mod client;

pub use client::{RestClient, RestClientConfig};
