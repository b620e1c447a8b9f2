//! Handle for one tracked pair.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use super::status::ScraperStatus;
use crate::domain::error::ScraperError;
use crate::domain::trade::ExchangePair;

/// One actively tracked pair on one exchange.
///
/// Owned by exactly one scraper; cloning yields another handle to the same
/// pair. Closing it removes the pair from the next polling pass.
#[derive(Debug, Clone)]
pub struct PairScraper {
    pair: ExchangePair,
    closed: Arc<AtomicBool>,
    /// Owner's status (back-reference, not ownership).
    status: Arc<ScraperStatus>,
}

impl PairScraper {
    pub(crate) fn new(pair: ExchangePair, status: Arc<ScraperStatus>) -> Self {
        Self {
            pair,
            closed: Arc::new(AtomicBool::new(false)),
            status,
        }
    }

    /// The tracked pair.
    pub fn pair(&self) -> &ExchangePair {
        &self.pair
    }

    /// Error recorded by the owning scraper.
    pub async fn error(&self) -> Option<ScraperError> {
        self.status.error().await
    }

    /// Stop polling this pair.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}
