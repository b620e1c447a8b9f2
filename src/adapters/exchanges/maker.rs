//! Maker (OasisDEX) REST Source
//!
//! OasisDEX exposes pairs and trade history over plain REST, so trades
//! are polled rather than streamed. Native pair names use `/`
//! (`ETH/DAI`); trade ids are increasing integers and serve as cursor.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, instrument, warn};

use crate::adapters::http::RestClient;
use crate::domain::cursor::TradeCursor;
use crate::domain::error::ScraperError;
use crate::domain::pair::{self, PAIR_SEPARATOR};
use crate::domain::trade::{ExchangePair, RawTrade};
use crate::ports::trade_source::TradeSource;

/// Default OasisDEX API root.
pub const MAKER_API_URL: &str = "https://api.oasisdex.com/v2";

/// Page size requested when following a cursor.
pub const MAKER_PAGE_LIMIT: u32 = 100;

/// Native pair separator.
const MAKER_SEPARATOR: char = '/';

/// `GET /pairs` response.
#[derive(Debug, Deserialize)]
pub struct MakerPairResponse {
    #[serde(default)]
    pub data: HashMap<String, MakerPair>,
    #[serde(default)]
    pub message: Option<String>,
}

/// One listed pair.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MakerPair {
    pub base: String,
    pub quote: String,
    #[serde(default)]
    pub base_precision: u32,
    #[serde(default)]
    pub quote_precision: u32,
    #[serde(default)]
    pub active: bool,
}

/// `GET /trades/{base}/{quote}` response.
#[derive(Debug, Deserialize)]
pub struct MakerTradeResponse {
    #[serde(default)]
    pub data: Vec<MakerTrade>,
    #[serde(default)]
    pub message: Option<String>,
}

/// One trade as OasisDEX reports it.
#[derive(Debug, Deserialize)]
pub struct MakerTrade {
    pub id: u64,
    pub price: String,
    pub volume: String,
    pub time: DateTime<Utc>,
}

impl From<MakerTrade> for RawTrade {
    fn from(trade: MakerTrade) -> Self {
        Self {
            foreign_trade_id: trade.id.to_string(),
            sequence: trade.id,
            price: trade.price,
            volume: trade.volume,
            time: trade.time,
        }
    }
}

/// OasisDEX trade source.
pub struct MakerSource {
    exchange: String,
    client: Arc<RestClient>,
}

impl MakerSource {
    pub fn new(exchange: &str, client: Arc<RestClient>) -> Self {
        Self {
            exchange: exchange.to_string(),
            client,
        }
    }

    /// Request path for a pair's trades after `cursor`.
    ///
    /// # Errors
    /// `InvalidPair` when `foreign_name` is not `BASE-QUOTE`.
    pub fn trades_path(foreign_name: &str, cursor: Option<&TradeCursor>) -> Result<String, ScraperError> {
        let (base, quote) = pair::split_pair(foreign_name, PAIR_SEPARATOR)?;
        Ok(match cursor {
            None => format!("/trades/{base}/{quote}"),
            Some(cursor) => format!(
                "/trades/{base}/{quote}?limit={MAKER_PAGE_LIMIT}&fromId={}",
                cursor.sequence + 1
            ),
        })
    }

    /// Convert a pair listing into canonical pairs, sorted by foreign name.
    pub fn parse_pairs(exchange: &str, response: MakerPairResponse) -> Vec<ExchangePair> {
        let mut pairs: Vec<ExchangePair> = response
            .data
            .into_iter()
            .filter_map(|(native, listed)| match pair::canonicalize(&native, MAKER_SEPARATOR) {
                Ok(foreign_name) => {
                    debug!(
                        pair = %foreign_name,
                        active = listed.active,
                        base_precision = listed.base_precision,
                        quote_precision = listed.quote_precision,
                        "Listed pair"
                    );
                    Some(ExchangePair::new(exchange, &listed.base, &foreign_name))
                }
                Err(e) => {
                    warn!(exchange, pair = %native, error = %e, "Skipping unparseable pair");
                    None
                }
            })
            .collect();
        pairs.sort_by(|a, b| a.foreign_name.cmp(&b.foreign_name));
        pairs
    }
}

#[async_trait]
impl TradeSource for MakerSource {
    #[instrument(skip(self), fields(exchange = %self.exchange))]
    async fn fetch_available_pairs(&self) -> Result<Vec<ExchangePair>> {
        let response: MakerPairResponse = self.client.get_json("/pairs").await?;
        if let Some(message) = response.message.as_deref().filter(|m| !m.is_empty()) {
            debug!(message, "Pair listing message");
        }
        Ok(Self::parse_pairs(&self.exchange, response))
    }

    async fn fetch_trades(&self, pair: &ExchangePair, cursor: Option<TradeCursor>) -> Result<Vec<RawTrade>> {
        let path = Self::trades_path(&pair.foreign_name, cursor.as_ref())?;
        let response: MakerTradeResponse = self.client.get_json(&path).await?;
        Ok(response.data.into_iter().map(RawTrade::from).collect())
    }

    fn normalize_pair(&self, mut pair: ExchangePair) -> Result<ExchangePair, ScraperError> {
        pair.foreign_name = pair::canonicalize(pair.foreign_name.trim(), MAKER_SEPARATOR)?;
        if pair.symbol.is_empty() {
            pair.symbol = pair.base_symbol().to_string();
        }
        if pair.exchange.is_empty() {
            pair.exchange.clone_from(&self.exchange);
        }
        Ok(pair)
    }
}
