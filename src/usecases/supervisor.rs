//! Scraper Supervisor - Lifecycle Management for Exchange Scrapers
//!
//! Registers pairs on each exchange scraper, starts it, and fans every
//! scraper's output channel into one shared sink channel. Shutdown
//! closes all scrapers concurrently and reports their terminal errors.

use std::sync::Arc;

use anyhow::{Context, Result};
use futures_util::future::join_all;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, instrument, warn};

use crate::adapters::metrics::HealthState;
use crate::config::ExchangeConfig;
use crate::domain::error::ScraperError;
use crate::domain::trade::{ExchangePair, TradeRecord};
use crate::ports::scraper::ExchangeScraper;

/// Owns every running exchange scraper.
pub struct ScraperSupervisor {
    scrapers: Vec<Arc<dyn ExchangeScraper>>,
    forwarders: Vec<JoinHandle<()>>,
    sink_tx: mpsc::Sender<TradeRecord>,
    health: Arc<HealthState>,
}

impl ScraperSupervisor {
    pub fn new(sink_tx: mpsc::Sender<TradeRecord>, health: Arc<HealthState>) -> Self {
        Self {
            scrapers: Vec::new(),
            forwarders: Vec::new(),
            sink_tx,
            health,
        }
    }

    /// Names of the supervised exchanges.
    pub fn exchanges(&self) -> Vec<&str> {
        self.scrapers.iter().map(|s| s.exchange_name()).collect()
    }

    /// Pairs to scrape: the configured whitelist, else the exchange listing.
    async fn pairs_for(config: &ExchangeConfig, scraper: &dyn ExchangeScraper) -> Result<Vec<ExchangePair>> {
        if !config.pairs.is_empty() {
            return Ok(config.pairs.iter().map(|p| p.to_exchange_pair(config)).collect());
        }
        scraper
            .fetch_available_pairs()
            .await
            .with_context(|| format!("Failed to list pairs of {}", config.name))
    }

    /// Register pairs on `scraper`, start it and forward its trades.
    ///
    /// Returns the number of registered pairs. A scraper that ends up
    /// with no pairs is closed and not supervised.
    #[instrument(skip(self, config, scraper), fields(exchange = %config.name))]
    pub async fn launch(&mut self, config: &ExchangeConfig, scraper: Box<dyn ExchangeScraper>) -> Result<usize> {
        let scraper: Arc<dyn ExchangeScraper> = Arc::from(scraper);

        let pairs = match Self::pairs_for(config, scraper.as_ref()).await {
            Ok(pairs) => pairs,
            Err(e) => {
                let _ = scraper.close().await;
                return Err(e);
            }
        };

        let mut registered = 0;
        for pair in pairs {
            let name = pair.foreign_name.clone();
            let pair = match scraper.normalize_pair(pair) {
                Ok(pair) => pair,
                Err(e) => {
                    warn!(pair = %name, error = %e, "Skipping pair that cannot be normalized");
                    continue;
                }
            };
            if let Err(e) = scraper.scrape_pair(pair).await {
                let _ = scraper.close().await;
                return Err(e).with_context(|| format!("Failed to register {name} on {}", config.name));
            }
            registered += 1;
        }

        if registered == 0 {
            let _ = scraper.close().await;
            anyhow::bail!("No pairs to scrape on {}", config.name);
        }

        let Some(mut rx) = scraper.channel() else {
            let _ = scraper.close().await;
            anyhow::bail!("Output channel of {} already taken", config.name);
        };
        scraper.start().await?;
        self.health.scraper_started();

        let sink_tx = self.sink_tx.clone();
        let health = Arc::clone(&self.health);
        let exchange = config.name.clone();
        self.forwarders.push(tokio::spawn(async move {
            while let Some(trade) = rx.recv().await {
                if sink_tx.send(trade).await.is_err() {
                    warn!(exchange = %exchange, "Trade sink closed, dropping forwarder");
                    break;
                }
            }
            health.scraper_stopped();
            info!(exchange = %exchange, "Trade forwarder exited");
        }));

        info!(pairs = registered, "Scraper launched");
        self.scrapers.push(scraper);
        Ok(registered)
    }

    /// Close every scraper concurrently and wait for the forwarders.
    ///
    /// Returns the exchanges whose scraper ended with an error other than
    /// a close request.
    #[instrument(skip(self))]
    pub async fn close_all(&mut self) -> Vec<(String, ScraperError)> {
        let scrapers = std::mem::take(&mut self.scrapers);
        let results = join_all(scrapers.iter().map(|scraper| async move {
            (scraper.exchange_name().to_string(), scraper.close().await)
        }))
        .await;

        let failures: Vec<(String, ScraperError)> = results
            .into_iter()
            .filter_map(|(exchange, result)| result.err().map(|e| (exchange, e)))
            .collect();
        for (exchange, e) in &failures {
            error!(exchange = %exchange, error = %e, "Scraper terminated with error");
        }

        for handle in join_all(std::mem::take(&mut self.forwarders)).await {
            if let Err(e) = handle {
                error!(error = %e, "Trade forwarder task failed");
            }
        }

        info!(failed = failures.len(), "All scrapers closed");
        failures
    }
}
