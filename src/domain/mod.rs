//! Domain layer - Canonical trade model and pure scraping logic.
//!
//! No I/O here (hexagonal architecture inner ring): trade normalization,
//! pair naming, cursor bookkeeping and the error taxonomy are all
//! testable in isolation.

pub mod cursor;
pub mod error;
pub mod pair;
pub mod trade;

// Re-export core types for convenience
pub use cursor::{CursorBook, TradeCursor};
pub use error::ScraperError;
pub use trade::{
    Asset, Exchange, ExchangePair, RawTrade, ResolvedPair, TradeRecord, UnderlyingPair,
};
