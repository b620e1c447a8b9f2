//! Trade Source Port - Exchange REST Capability
//!
//! The exchange-specific half of a scraper: listing pairs and fetching
//! trade history. The generic scraper engine drives a `TradeSource`
//! injected at construction, so exchange state (base URL, rate limits,
//! auth) stays inside the adapter.

use async_trait::async_trait;

use crate::domain::cursor::TradeCursor;
use crate::domain::error::ScraperError;
use crate::domain::trade::{Asset, ExchangePair, RawTrade};

/// Exchange-specific data access used by the scraper engine.
#[async_trait]
pub trait TradeSource: Send + Sync + 'static {
  /// Query the pair-listing endpoint.
  ///
  /// Returned pairs carry canonical `BASE-QUOTE` foreign names.
  async fn fetch_available_pairs(&self) -> anyhow::Result<Vec<ExchangePair>>;

  /// Fetch trades for `pair` newer than `cursor` (all recent trades when
  /// `None`). Page order is up to the exchange.
  async fn fetch_trades(
    &self,
    pair: &ExchangePair,
    cursor: Option<TradeCursor>,
  ) -> anyhow::Result<Vec<RawTrade>>;

  /// Exchange-specific canonicalization. Must be idempotent.
  fn normalize_pair(&self, pair: ExchangePair) -> Result<ExchangePair, ScraperError> {
    Ok(pair)
  }

  /// Asset metadata for a symbol. DEX sources know only the ticker.
  fn fill_symbol_data(&self, symbol: &str) -> Asset {
    Asset::from_symbol(symbol)
  }
}
