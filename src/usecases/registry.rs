//! Scraper registry - factory for exchange scrapers from config.

use std::sync::Arc;

use anyhow::{Result, anyhow};

use crate::adapters::exchanges::maker::{MAKER_API_URL, MakerSource};
use crate::adapters::http::RestClient;
use crate::config::{ExchangeConfig, HttpConfig};
use crate::ports::pair_resolver::PairResolver;
use crate::ports::scraper::ExchangeScraper;
use crate::ports::trade_source::TradeSource;
use crate::usecases::scraper::{Scraper, ScraperOptions};

/// Exchange names with a scraper implementation.
pub const SUPPORTED_EXCHANGES: &[&str] = &["maker", "oasis"];

/// Build the trade source for `config.name` (case-insensitive).
pub fn create_source(config: &ExchangeConfig, http: &HttpConfig) -> Result<Arc<dyn TradeSource>> {
    let exchange = config.name.to_lowercase();

    match exchange.as_str() {
        "maker" | "oasis" => {
            let base_url = config.base_url.as_deref().unwrap_or(MAKER_API_URL);
            let client = RestClient::new(http.client_config(base_url))?;
            Ok(Arc::new(MakerSource::new(&config.name, Arc::new(client))))
        }
        other => Err(anyhow!(
            "Unknown exchange: {other} (supported: {})",
            SUPPORTED_EXCHANGES.join(", ")
        )),
    }
}

/// Create an unstarted scraper for `config`.
///
/// Pairs are registered by the caller, which then calls `start`.
pub fn create_scraper(
    config: &ExchangeConfig,
    http: &HttpConfig,
    resolver: Arc<dyn PairResolver>,
    options: ScraperOptions,
) -> Result<Box<dyn ExchangeScraper>> {
    let source = create_source(config, http)?;
    Ok(Box::new(Scraper::new(
        config.descriptor(),
        source,
        resolver,
        options,
        false,
    )))
}
