//! Exchange Source Adapters
//!
//! Each exchange implements the `TradeSource` port; the generic scraper
//! engine supplies polling, cursors and shutdown.

pub mod maker;

pub use maker::MakerSource;
