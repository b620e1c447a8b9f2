//! Core trade domain types.
//!
//! Defines the canonical, exchange-agnostic `TradeRecord` every scraper
//! emits, the `ExchangePair` it is resolved against, and the `RawTrade`
//! shape exchange sources hand to the engine before normalization.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::ScraperError;
use super::pair;

// ────────────────────────────────────────────
// Exchange and asset identities
// ────────────────────────────────────────────

/// Exchange descriptor supplied by the configuration loader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exchange {
    /// Exchange name, also used as `TradeRecord::source`.
    pub name: String,
    /// Centralized exchange (false for DEXes).
    #[serde(default)]
    pub centralized: bool,
    /// Chain the exchange settles on (empty for CEXes).
    #[serde(default)]
    pub blockchain: String,
}

impl Exchange {
    /// Descriptor with only a name set.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            centralized: false,
            blockchain: String::new(),
        }
    }
}

/// On-chain or off-chain asset identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub symbol: String,
    pub name: String,
    pub address: String,
    pub blockchain: String,
    pub decimals: u8,
}

impl Asset {
    /// Asset known only by its ticker symbol.
    pub fn from_symbol(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            ..Self::default()
        }
    }

    /// True when no identity has been resolved.
    pub fn is_empty(&self) -> bool {
        self.symbol.is_empty() && self.address.is_empty()
    }
}

/// Base/quote token identities behind an exchange pair.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnderlyingPair {
    pub base_token: Asset,
    pub quote_token: Asset,
}

/// A tradable pair on one exchange.
///
/// Produced by pair discovery or supplied by the operator; read-only for
/// the scraper.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangePair {
    /// Base asset ticker.
    pub symbol: String,
    /// Exchange-native pair identifier in canonical form (e.g. "ETH-DAI").
    pub foreign_name: String,
    /// Exchange name.
    pub exchange: String,
    /// Whether the underlying tokens are resolved.
    pub verified: bool,
    /// Resolved token identities.
    pub underlying_pair: UnderlyingPair,
}

impl ExchangePair {
    /// Unverified pair with symbol and foreign name.
    pub fn new(exchange: &str, symbol: &str, foreign_name: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            foreign_name: foreign_name.to_string(),
            exchange: exchange.to_string(),
            ..Self::default()
        }
    }

    /// Ticker used for emitted trades: the pair symbol, else the base of the
    /// foreign name, else the foreign name itself.
    pub fn base_symbol(&self) -> &str {
        if !self.symbol.is_empty() {
            return &self.symbol;
        }
        pair::base_of(&self.foreign_name).unwrap_or(&self.foreign_name)
    }
}

// ────────────────────────────────────────────
// Raw and canonical trades
// ────────────────────────────────────────────

/// Trade as returned by an exchange, numeric fields still textual.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTrade {
    /// Exchange-native trade identifier.
    pub foreign_trade_id: String,
    /// Position in the exchange's native trade order (higher = newer).
    pub sequence: u64,
    /// Price as decimal text.
    pub price: String,
    /// Volume as decimal text.
    pub volume: String,
    /// Exchange-reported timestamp.
    pub time: DateTime<Utc>,
}

/// Verification outcome for one pair lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedPair {
    pub verified: bool,
    pub base_token: Asset,
    pub quote_token: Asset,
}

impl From<ExchangePair> for ResolvedPair {
    fn from(pair: ExchangePair) -> Self {
        Self {
            verified: pair.verified,
            base_token: pair.underlying_pair.base_token,
            quote_token: pair.underlying_pair.quote_token,
        }
    }
}

/// Canonical, exchange-agnostic trade.
///
/// Immutable once built; ownership moves to the consumer on send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    /// Base asset ticker.
    pub symbol: String,
    /// Canonical "BASE-QUOTE" identifier.
    pub pair: String,
    /// Quote currency per base unit.
    pub price: f64,
    /// Base units traded.
    pub volume: f64,
    /// Exchange-reported timestamp.
    pub time: DateTime<Utc>,
    /// Exchange-native trade identifier.
    pub foreign_trade_id: String,
    /// Exchange name.
    pub source: String,
    /// Whether base/quote tokens are resolved.
    pub verified_pair: bool,
    pub base_token: Asset,
    pub quote_token: Asset,
}

impl TradeRecord {
    /// Normalize a raw exchange trade.
    ///
    /// # Errors
    /// `ScraperError::Decode` when price or volume is not a finite decimal.
    pub fn from_raw(
        raw: &RawTrade,
        pair: &ExchangePair,
        source: &str,
        resolved: &ResolvedPair,
    ) -> Result<Self, ScraperError> {
        let price = parse_decimal("price", &raw.price)?;
        let volume = parse_decimal("volume", &raw.volume)?;

        Ok(Self {
            symbol: pair.base_symbol().to_string(),
            pair: pair.foreign_name.clone(),
            price,
            volume,
            time: raw.time,
            foreign_trade_id: raw.foreign_trade_id.clone(),
            source: source.to_string(),
            verified_pair: resolved.verified,
            base_token: resolved.base_token.clone(),
            quote_token: resolved.quote_token.clone(),
        })
    }
}

/// Parse a decimal text field into a finite `f64`.
pub fn parse_decimal(field: &'static str, text: &str) -> Result<f64, ScraperError> {
    text.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ScraperError::Decode {
            field,
            value: text.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(id: u64, price: &str, volume: &str) -> RawTrade {
        RawTrade {
            foreign_trade_id: id.to_string(),
            sequence: id,
            price: price.to_string(),
            volume: volume.to_string(),
            time: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
        }
    }

    #[test]
    fn test_from_raw_builds_record() {
        let pair = ExchangePair::new("Maker", "ETH", "ETH-DAI");
        let record =
            TradeRecord::from_raw(&raw(5, "100.5", "2.0"), &pair, "Maker", &ResolvedPair::default())
                .unwrap();

        assert_eq!(record.symbol, "ETH");
        assert_eq!(record.pair, "ETH-DAI");
        assert!((record.price - 100.5).abs() < f64::EPSILON);
        assert!((record.volume - 2.0).abs() < f64::EPSILON);
        assert_eq!(record.foreign_trade_id, "5");
        assert_eq!(record.source, "Maker");
        assert!(!record.verified_pair);
        assert!(record.base_token.is_empty());
    }

    #[test]
    fn test_from_raw_rejects_bad_price() {
        let pair = ExchangePair::new("Maker", "ETH", "ETH-DAI");
        let err =
            TradeRecord::from_raw(&raw(1, "1,5", "2"), &pair, "Maker", &ResolvedPair::default())
                .unwrap_err();
        assert_eq!(
            err,
            ScraperError::Decode {
                field: "price",
                value: "1,5".to_string()
            }
        );
    }

    #[test]
    fn test_parse_decimal_rejects_non_finite() {
        assert!(parse_decimal("volume", "NaN").is_err());
        assert!(parse_decimal("volume", "inf").is_err());
        assert!(parse_decimal("volume", "").is_err());
        assert!((parse_decimal("volume", " 0.25 ").unwrap() - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn test_base_symbol_falls_back_to_foreign_name() {
        let pair = ExchangePair::new("Maker", "", "MKR-DAI");
        assert_eq!(pair.base_symbol(), "MKR");
    }

    #[test]
    fn test_resolved_pair_from_exchange_pair() {
        let mut pair = ExchangePair::new("Maker", "ETH", "ETH-DAI");
        pair.verified = true;
        pair.underlying_pair.base_token = Asset::from_symbol("WETH");
        let resolved = ResolvedPair::from(pair);
        assert!(resolved.verified);
        assert_eq!(resolved.base_token.symbol, "WETH");
    }
}
