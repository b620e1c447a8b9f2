//! Scraper error taxonomy.
//!
//! Transient failures (`Fetch`, `Decode`) are logged and skipped inside a
//! worker and never cross its boundary. Terminal failures are recorded as the
//! worker's final error and surface through `error()` / `close()` only.

use thiserror::Error;

/// Errors raised by the scraper framework.
///
/// `Clone` because the recorded terminal error is handed out to every
/// caller of `error()` while the worker keeps its own copy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScraperError {
    /// The scraper (or pair) was closed; no more registrations or scraping.
    #[error("scraper is closed")]
    Closed,

    /// The worker was started with an empty pair registry.
    #[error("no pairs to scrape provided")]
    NoPairs,

    /// Default terminal cause when the caller stopped the worker.
    #[error("main loop terminated by close()")]
    ClosedByCaller,

    /// `start()` called on a worker that is already running.
    #[error("scraper is already running")]
    AlreadyRunning,

    /// The consumer dropped the output channel receiver.
    #[error("trade channel closed by consumer")]
    ChannelClosed,

    /// The worker task ended abnormally (panic or abort).
    #[error("worker task failed: {0}")]
    Worker(String),

    /// A numeric trade field could not be parsed.
    #[error("cannot decode {field} from {value:?}")]
    Decode {
        /// Field name (`price`, `volume`).
        field: &'static str,
        /// Raw text returned by the exchange.
        value: String,
    },

    /// A pair name does not have the `BASE<sep>QUOTE` shape.
    #[error("invalid pair name: {0}")]
    InvalidPair(String),

    /// Exchange request failed.
    #[error("fetch failed: {0}")]
    Fetch(String),
}

impl ScraperError {
    /// Whether this error ends the worker (as opposed to a skipped item).
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Closed
                | Self::NoPairs
                | Self::ClosedByCaller
                | Self::ChannelClosed
                | Self::Worker(_)
        )
    }
}
