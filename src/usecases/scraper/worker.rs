//! Polling loop of one exchange.
//!
//! Sequential per exchange: each pass walks the registered pairs in
//! foreign-name order, fetches trades past the pair's cursor, normalizes
//! them and sends them on the output channel, then sleeps for the batch
//! delay. Fetch, send and sleep all race the cancellation token.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::ScraperShared;
use crate::domain::cursor::CursorBook;
use crate::domain::error::ScraperError;
use crate::domain::trade::{ExchangePair, ResolvedPair, TradeRecord};

/// Why the current pass stopped early.
enum Stop {
    Cancelled,
    Fatal(ScraperError),
}

pub(super) struct Worker {
    shared: Arc<ScraperShared>,
    tx: mpsc::Sender<TradeRecord>,
    cursors: CursorBook,
}

impl Worker {
    pub(super) fn new(shared: Arc<ScraperShared>, tx: mpsc::Sender<TradeRecord>) -> Self {
        Self {
            shared,
            tx,
            cursors: CursorBook::new(),
        }
    }

    /// Run until stopped. Returns the fatal error, `None` on a requested stop.
    ///
    /// Consumes the worker so the channel sender drops when the loop ends.
    pub(super) async fn run(mut self) -> Option<ScraperError> {
        let exchange = self.shared.exchange.name.clone();
        info!(exchange = %exchange, delay_secs = self.shared.options.batch_delay.as_secs(), "Scraper loop started");

        while self.shared.is_running() {
            let pairs = self.shared.active_pairs().await;
            if pairs.is_empty() {
                if !self.shared.is_running() {
                    // close() marked every pair closed under us.
                    break;
                }
                if !self.shared.shutdown_if_no_pairs().await {
                    // A pair was registered after the snapshot.
                    continue;
                }
                let err = ScraperError::NoPairs;
                error!(exchange = %exchange, error = %err, "Stopping scraper");
                return Some(err);
            }

            let active: HashSet<&str> = pairs.iter().map(|p| p.foreign_name.as_str()).collect();
            self.cursors.retain_pairs(|name| active.contains(name));

            let started = Instant::now();
            for pair in &pairs {
                if !self.shared.is_running() {
                    return None;
                }
                match self.poll_pair(pair).await {
                    Ok(()) => {}
                    Err(Stop::Cancelled) => return None,
                    Err(Stop::Fatal(err)) => {
                        error!(exchange = %exchange, error = %err, "Stopping scraper");
                        self.shared.status.begin_shutdown().await;
                        return Some(err);
                    }
                }
            }
            if let Some(metrics) = self.shared.metrics() {
                metrics
                    .cycle_duration_seconds
                    .with_label_values(&[exchange.as_str()])
                    .observe(started.elapsed().as_secs_f64());
            }

            tokio::select! {
                () = self.shared.cancel.cancelled() => break,
                () = tokio::time::sleep(self.shared.options.batch_delay) => {}
            }
        }

        None
    }

    /// Fetch, dedup and emit one pair's new trades.
    ///
    /// Fetch and decode failures are logged and skipped; only cancellation
    /// and a dropped consumer stop the pass.
    async fn poll_pair(&mut self, pair: &ExchangePair) -> Result<(), Stop> {
        let exchange = self.shared.exchange.name.as_str();
        let cursor = self.cursors.get(&pair.foreign_name).cloned();

        let fetched = tokio::select! {
            () = self.shared.cancel.cancelled() => return Err(Stop::Cancelled),
            result = self.shared.source.fetch_trades(pair, cursor) => result,
        };

        let trades = match fetched {
            Ok(trades) => trades,
            Err(e) => {
                let err = ScraperError::Fetch(format!("{e:#}"));
                warn!(exchange, pair = %pair.foreign_name, error = %err, "Trade fetch failed, retrying next cycle");
                if let Some(metrics) = self.shared.metrics() {
                    metrics.fetch_failures.with_label_values(&[exchange]).inc();
                }
                return Ok(());
            }
        };

        let fetched_count = trades.len();
        let fresh = self.cursors.accept(&pair.foreign_name, trades);
        debug!(
            exchange,
            pair = %pair.foreign_name,
            fetched = fetched_count,
            fresh = fresh.len(),
            "Polled pair"
        );
        if fresh.is_empty() {
            return Ok(());
        }

        let resolved = self.resolve(pair).await;

        for raw in &fresh {
            let record = match TradeRecord::from_raw(raw, pair, exchange, &resolved) {
                Ok(record) => record,
                Err(e) => {
                    warn!(
                        exchange,
                        pair = %pair.foreign_name,
                        trade_id = %raw.foreign_trade_id,
                        error = %e,
                        "Dropping undecodable trade"
                    );
                    if let Some(metrics) = self.shared.metrics() {
                        metrics.decode_failures.with_label_values(&[exchange]).inc();
                    }
                    continue;
                }
            };

            if record.verified_pair {
                info!(exchange, pair = %record.pair, price = record.price, volume = record.volume, "Got verified trade");
            }
            self.emit(record).await?;
        }

        Ok(())
    }

    /// Look the pair up; failures degrade to an unverified pair.
    async fn resolve(&self, pair: &ExchangePair) -> ResolvedPair {
        let exchange = self.shared.exchange.name.as_str();
        match self.shared.resolver.resolve(exchange, &pair.foreign_name).await {
            Ok(resolved) => resolved,
            Err(e) => {
                warn!(exchange, pair = %pair.foreign_name, error = %e, "Pair lookup failed, emitting unverified trades");
                if let Some(metrics) = self.shared.metrics() {
                    metrics.resolve_failures.with_label_values(&[exchange]).inc();
                }
                ResolvedPair::default()
            }
        }
    }

    /// Send one record, blocking on a slow consumer.
    async fn emit(&self, record: TradeRecord) -> Result<(), Stop> {
        let pair = record.pair.clone();
        let sent = tokio::select! {
            () = self.shared.cancel.cancelled() => return Err(Stop::Cancelled),
            sent = self.tx.send(record) => sent,
        };

        match sent {
            Ok(()) => {
                if let Some(metrics) = self.shared.metrics() {
                    metrics
                        .trades_emitted
                        .with_label_values(&[self.shared.exchange.name.as_str(), pair.as_str()])
                        .inc();
                }
                Ok(())
            }
            Err(_) => Err(Stop::Fatal(ScraperError::ChannelClosed)),
        }
    }
}
