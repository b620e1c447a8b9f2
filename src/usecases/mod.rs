//! Use Cases Layer - Application Business Logic
//!
//! Orchestrates domain logic with port interfaces to implement the
//! scraping workflows.
//!
//! Use cases:
//! - `scraper`: generic per-exchange polling engine
//! - `registry`: exchange name to scraper factory
//! - `supervisor`: pair registration, startup, fan-in and shutdown

pub mod registry;
pub mod scraper;
pub mod supervisor;

pub use registry::create_scraper;
pub use scraper::{PairScraper, Scraper, ScraperOptions, ScraperState};
pub use supervisor::ScraperSupervisor;
