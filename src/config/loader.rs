//! Configuration Loader - File Loading and Validation
//!
//! Handles loading `config.toml`, validating all parameters,
//! and providing clear error messages for misconfiguration.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use super::AppConfig;
use crate::domain::pair;

/// Environment variable naming the config file.
pub const CONFIG_PATH_ENV: &str = "SCRAPER_CONFIG";

/// Config file used when `SCRAPER_CONFIG` is unset.
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Config path from the environment, else the default.
pub fn config_path() -> String {
  std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string())
}

/// Load and validate configuration from a TOML file.
///
/// # Errors
/// Returns detailed error if the file can't be read, TOML parsing fails
/// or validation rules are violated.
pub fn load_config(path: &str) -> Result<AppConfig> {
  let path = Path::new(path);

  let content = std::fs::read_to_string(path)
    .with_context(|| format!("Failed to read config file: {}", path.display()))?;

  let config = parse_config(&content)?;

  info!(
    exchanges = config.exchanges.len(),
    enabled = config.enabled_exchanges().count(),
    batch_delay_secs = config.scraper.batch_delay_secs,
    "Configuration loaded successfully"
  );

  Ok(config)
}

/// Parse and validate configuration text.
pub fn parse_config(content: &str) -> Result<AppConfig> {
  let config: AppConfig = toml::from_str(content).context("Failed to parse config.toml")?;
  validate_config(&config)?;
  Ok(config)
}

fn validate_config(config: &AppConfig) -> Result<()> {
  anyhow::ensure!(!config.service.name.is_empty(), "service.name must not be empty");

  anyhow::ensure!(
    config.enabled_exchanges().next().is_some(),
    "At least one exchange must be enabled"
  );

  let mut seen = HashSet::new();
  for (i, exchange) in config.exchanges.iter().enumerate() {
    anyhow::ensure!(!exchange.name.is_empty(), "Exchange {i} has an empty name");
    anyhow::ensure!(
      seen.insert(exchange.name.to_lowercase()),
      "Exchange {} is configured twice",
      exchange.name
    );
    if let Some(url) = &exchange.base_url {
      anyhow::ensure!(
        url.starts_with("http://") || url.starts_with("https://"),
        "Exchange {} base_url must be http(s), got {url}",
        exchange.name
      );
    }
    anyhow::ensure!(
      exchange.batch_delay_secs != Some(0),
      "Exchange {} batch_delay_secs must be positive",
      exchange.name
    );
    for pair_config in &exchange.pairs {
      pair::canonicalize(&pair_config.foreign_name, '/').with_context(|| {
        format!("Exchange {} has invalid pair {}", exchange.name, pair_config.foreign_name)
      })?;
    }
  }

  anyhow::ensure!(config.scraper.batch_delay_secs > 0, "scraper.batch_delay_secs must be positive");
  anyhow::ensure!(config.scraper.channel_capacity > 0, "scraper.channel_capacity must be positive");

  anyhow::ensure!(config.http.timeout_ms > 0, "http.timeout_ms must be positive");
  anyhow::ensure!(
    config.http.requests_per_second > 0,
    "http.requests_per_second must be positive"
  );
  anyhow::ensure!(config.http.max_concurrent > 0, "http.max_concurrent must be positive");

  Ok(())
}
