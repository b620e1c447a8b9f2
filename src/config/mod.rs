//! Configuration Module - TOML-based Scraper Configuration
//!
//! Loads and validates configuration from `config.toml`. Exchange
//! metadata, API roots, pair whitelists and polling cadence are all
//! externalized here - nothing exchange-specific is hardcoded in the
//! scraper engine.

pub mod loader;

use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;

use crate::adapters::http::RestClientConfig;
use crate::domain::trade::{Asset, Exchange, ExchangePair, UnderlyingPair};

/// Top-level service configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
  /// Service identity and logging.
  pub service: ServiceConfig,
  /// Shared REST client tuning.
  #[serde(default)]
  pub http: HttpConfig,
  /// Default scraper tuning.
  #[serde(default)]
  pub scraper: ScraperConfig,
  /// Exchange definitions.
  #[serde(default)]
  pub exchanges: Vec<ExchangeConfig>,
  /// Metrics and monitoring.
  #[serde(default)]
  pub metrics: MetricsConfig,
  /// Trade sink.
  #[serde(default)]
  pub persistence: PersistenceConfig,
}

impl AppConfig {
  /// Exchange definitions keyed by name.
  pub fn exchanges_by_name(&self) -> HashMap<String, &ExchangeConfig> {
    self
      .exchanges
      .iter()
      .map(|exchange| (exchange.name.clone(), exchange))
      .collect()
  }

  /// Enabled exchanges, in file order.
  pub fn enabled_exchanges(&self) -> impl Iterator<Item = &ExchangeConfig> {
    self.exchanges.iter().filter(|exchange| exchange.enabled)
  }
}

/// Service identity configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
  /// Human-readable service name.
  pub name: String,
  /// Log level used when `RUST_LOG` is unset.
  #[serde(default = "default_log_level")]
  pub log_level: String,
  /// Emit JSON log lines.
  #[serde(default = "default_true")]
  pub json_logs: bool,
}

/// REST client configuration shared by all exchanges.
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
  #[serde(default = "default_timeout_ms")]
  pub timeout_ms: u64,
  #[serde(default = "default_max_retries")]
  pub max_retries: u32,
  #[serde(default = "default_retry_base_delay_ms")]
  pub retry_base_delay_ms: u64,
  #[serde(default = "default_requests_per_second")]
  pub requests_per_second: u32,
  #[serde(default = "default_max_concurrent")]
  pub max_concurrent: usize,
}

impl Default for HttpConfig {
  fn default() -> Self {
    Self {
      timeout_ms: default_timeout_ms(),
      max_retries: default_max_retries(),
      retry_base_delay_ms: default_retry_base_delay_ms(),
      requests_per_second: default_requests_per_second(),
      max_concurrent: default_max_concurrent(),
    }
  }
}

impl HttpConfig {
  /// Client configuration for one exchange API root.
  pub fn client_config(&self, base_url: &str) -> RestClientConfig {
    RestClientConfig {
      base_url: base_url.to_string(),
      timeout: Duration::from_millis(self.timeout_ms),
      max_concurrent: self.max_concurrent,
      max_retries: self.max_retries,
      retry_base_delay: Duration::from_millis(self.retry_base_delay_ms),
      requests_per_second: self.requests_per_second,
    }
  }
}

/// Scraper defaults, overridable per exchange.
#[derive(Debug, Clone, Deserialize)]
pub struct ScraperConfig {
  /// Pause between two polling passes (seconds).
  #[serde(default = "default_batch_delay_secs")]
  pub batch_delay_secs: u64,
  /// Output channel capacity per exchange.
  #[serde(default = "default_channel_capacity")]
  pub channel_capacity: usize,
}

impl Default for ScraperConfig {
  fn default() -> Self {
    Self {
      batch_delay_secs: default_batch_delay_secs(),
      channel_capacity: default_channel_capacity(),
    }
  }
}

/// One exchange definition.
#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeConfig {
  /// Exchange name, also the `source` of emitted trades.
  pub name: String,
  #[serde(default = "default_true")]
  pub enabled: bool,
  #[serde(default)]
  pub centralized: bool,
  #[serde(default)]
  pub blockchain: String,
  /// API root override.
  pub base_url: Option<String>,
  /// Batch delay override (seconds).
  pub batch_delay_secs: Option<u64>,
  /// Pair whitelist. Empty means discover pairs from the exchange.
  #[serde(default)]
  pub pairs: Vec<PairConfig>,
}

impl ExchangeConfig {
  /// Exchange descriptor handed to the scraper.
  pub fn descriptor(&self) -> Exchange {
    Exchange {
      name: self.name.clone(),
      centralized: self.centralized,
      blockchain: self.blockchain.clone(),
    }
  }

  /// Effective batch delay.
  pub fn batch_delay(&self, defaults: &ScraperConfig) -> Duration {
    Duration::from_secs(self.batch_delay_secs.unwrap_or(defaults.batch_delay_secs))
  }
}

/// One whitelisted pair, optionally pre-resolved.
#[derive(Debug, Clone, Deserialize)]
pub struct PairConfig {
  /// Pair name, native or canonical form.
  pub foreign_name: String,
  /// Base ticker. Derived from the name when empty.
  #[serde(default)]
  pub symbol: String,
  #[serde(default)]
  pub verified: bool,
  /// Base token address (resolved pairs only).
  #[serde(default)]
  pub base_token: Option<String>,
  /// Quote token address (resolved pairs only).
  #[serde(default)]
  pub quote_token: Option<String>,
}

impl PairConfig {
  /// Pair record for `exchange`, with token identities when configured.
  pub fn to_exchange_pair(&self, exchange: &ExchangeConfig) -> ExchangePair {
    let mut pair = ExchangePair::new(&exchange.name, &self.symbol, &self.foreign_name);
    pair.verified = self.verified;

    let token = |address: &Option<String>| Asset {
      address: address.clone().unwrap_or_default(),
      blockchain: exchange.blockchain.clone(),
      ..Asset::default()
    };
    pair.underlying_pair = UnderlyingPair {
      base_token: token(&self.base_token),
      quote_token: token(&self.quote_token),
    };
    pair
  }
}

/// Metrics and monitoring configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
  /// Enable Prometheus metrics export.
  #[serde(default = "default_true")]
  pub enabled: bool,
  /// Metrics server bind address.
  #[serde(default = "default_metrics_addr")]
  pub bind_address: String,
  /// Health check endpoint port.
  #[serde(default = "default_health_port")]
  pub health_port: u16,
}

impl Default for MetricsConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      bind_address: default_metrics_addr(),
      health_port: default_health_port(),
    }
  }
}

/// Persistence configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PersistenceConfig {
  /// Directory for JSONL trade logs.
  #[serde(default = "default_data_dir")]
  pub data_dir: String,
}

impl Default for PersistenceConfig {
  fn default() -> Self {
    Self {
      data_dir: default_data_dir(),
    }
  }
}

// Default value functions for serde

fn default_log_level() -> String {
  "info".to_string()
}

fn default_true() -> bool {
  true
}

fn default_timeout_ms() -> u64 {
  30_000
}

fn default_max_retries() -> u32 {
  3
}

fn default_retry_base_delay_ms() -> u64 {
  200
}

fn default_requests_per_second() -> u32 {
  5
}

fn default_max_concurrent() -> usize {
  4
}

fn default_batch_delay_secs() -> u64 {
  60
}

fn default_channel_capacity() -> usize {
  16
}

fn default_metrics_addr() -> String {
  "0.0.0.0:9090".to_string()
}

fn default_health_port() -> u16 {
  8080
}

fn default_data_dir() -> String {
  "data".to_string()
}
