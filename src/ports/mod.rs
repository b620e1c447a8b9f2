//! Ports Layer - Hexagonal Architecture Boundaries
//!
//! Defines the interfaces (traits) that the scraper engine requires from
//! the outside world, and the contract it offers back. Adapters implement
//! these traits.
//!
//! Port categories:
//! - `PairResolver`: Exchange pair lookup cache (verification, tokens)
//! - `TradeSource`: Exchange-specific pair listing and trade history
//! - `ExchangeScraper`: Uniform per-exchange worker contract

pub mod pair_resolver;
pub mod scraper;
pub mod trade_source;

pub use pair_resolver::PairResolver;
pub use scraper::ExchangeScraper;
pub use trade_source::TradeSource;
