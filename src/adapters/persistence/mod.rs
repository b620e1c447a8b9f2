//! Persistence Adapters - JSONL File Storage
//!
//! Append-only daily JSONL files for scraped trades. No database
//! dependency.

pub mod trades;

pub use trades::TradeLogger;
