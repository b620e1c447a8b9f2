//! Exchange Scraper Port - Uniform Per-Exchange Worker Contract
//!
//! Every exchange worker exposes the same capability set so the
//! supervisor can treat all exchanges polymorphically:
//! discover pairs, normalize a pair, register a pair, start,
//! take the output channel, read the terminal error, close.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::domain::error::ScraperError;
use crate::domain::trade::{Asset, ExchangePair, TradeRecord};
use crate::usecases::scraper::PairScraper;

/// Trait implemented once per exchange worker.
#[async_trait]
pub trait ExchangeScraper: Send + Sync {
  /// Exchange name (`TradeRecord::source`).
  fn exchange_name(&self) -> &str;

  /// List tradable pairs from the exchange.
  async fn fetch_available_pairs(&self) -> anyhow::Result<Vec<ExchangePair>>;

  /// Exchange-specific canonicalization hook. Idempotent.
  fn normalize_pair(&self, pair: ExchangePair) -> Result<ExchangePair, ScraperError>;

  /// Asset metadata for a ticker symbol.
  fn fill_symbol_data(&self, symbol: &str) -> Asset;

  /// Register a pair for polling.
  ///
  /// Fails with the recorded error, or `Closed` once closed.
  async fn scrape_pair(&self, pair: ExchangePair) -> Result<PairScraper, ScraperError>;

  /// Start the polling loop of a worker created without auto-start.
  async fn start(&self) -> Result<(), ScraperError>;

  /// Take the output channel. Only the first call yields the receiver.
  fn channel(&self) -> Option<mpsc::Receiver<TradeRecord>>;

  /// Most recently recorded error, if any.
  async fn error(&self) -> Option<ScraperError>;

  /// Stop the worker and wait until it no longer sends.
  ///
  /// `Ok` when the worker was stopped by this (or an earlier) close,
  /// otherwise the terminal error that ended it.
  async fn close(&self) -> Result<(), ScraperError>;
}
