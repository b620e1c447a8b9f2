//! Scraper Engine - Per-Exchange Polling Worker
//!
//! One `Scraper` per exchange owns the pair registry, the output channel
//! and the shutdown/error state, and drives a single sequential polling
//! loop over an injected `TradeSource`. Separate exchanges run separate
//! scrapers in parallel.
//!
//! Lifecycle: `Created -> Running -> ShuttingDown -> Closed`.
//! Every exit of the loop (stop, no pairs, consumer gone, panic) goes
//! through one `finish` call made by a supervising task, so `close()` can
//! always wait for it.

pub mod pair;
pub mod status;
mod worker;

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{RwLock, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

pub use pair::PairScraper;
pub use status::{ScraperState, ScraperStatus};

use self::worker::Worker;
use crate::adapters::metrics::MetricsRegistry;
use crate::domain::error::ScraperError;
use crate::domain::trade::{Asset, Exchange, ExchangePair, TradeRecord};
use crate::ports::pair_resolver::PairResolver;
use crate::ports::scraper::ExchangeScraper;
use crate::ports::trade_source::TradeSource;

/// Default pause between two polling passes.
pub const DEFAULT_BATCH_DELAY: Duration = Duration::from_secs(60);

/// Default output channel capacity.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 16;

/// Tuning knobs of one scraper.
#[derive(Clone)]
pub struct ScraperOptions {
    /// Sleep between two full passes over all pairs.
    pub batch_delay: Duration,
    /// Bounded output channel capacity (backpressure beyond it).
    pub channel_capacity: usize,
    /// Optional metrics sink.
    pub metrics: Option<Arc<MetricsRegistry>>,
}

impl Default for ScraperOptions {
    fn default() -> Self {
        Self {
            batch_delay: DEFAULT_BATCH_DELAY,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            metrics: None,
        }
    }
}

impl ScraperOptions {
    #[must_use]
    pub fn with_batch_delay(mut self, delay: Duration) -> Self {
        self.batch_delay = delay;
        self
    }

    #[must_use]
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
        self.metrics = Some(metrics);
        self
    }
}

/// State shared between the scraper handle and its worker task.
pub(crate) struct ScraperShared {
    exchange: Exchange,
    source: Arc<dyn TradeSource>,
    resolver: Arc<dyn PairResolver>,
    options: ScraperOptions,
    /// Pair registry keyed by foreign name. Lock order: status, then pairs.
    pairs: RwLock<BTreeMap<String, PairScraper>>,
    status: Arc<ScraperStatus>,
    run: AtomicBool,
    cancel: CancellationToken,
}

impl ScraperShared {
    fn is_running(&self) -> bool {
        self.run.load(Ordering::SeqCst) && !self.cancel.is_cancelled()
    }

    fn metrics(&self) -> Option<&MetricsRegistry> {
        self.options.metrics.as_deref()
    }

    #[allow(clippy::cast_precision_loss)]
    fn set_pairs_gauge(&self, count: usize) {
        if let Some(metrics) = self.metrics() {
            metrics
                .registered_pairs
                .with_label_values(&[self.exchange.name.as_str()])
                .set(count as f64);
        }
    }

    fn set_running_gauge(&self, running: bool) {
        if let Some(metrics) = self.metrics() {
            metrics
                .scraper_running
                .with_label_values(&[self.exchange.name.as_str()])
                .set(if running { 1.0 } else { 0.0 });
        }
    }

    /// Drop closed pairs and snapshot the rest, sorted by foreign name.
    async fn active_pairs(&self) -> Vec<ExchangePair> {
        let mut pairs = self.pairs.write().await;
        pairs.retain(|name, handle| {
            let keep = !handle.is_closed();
            if !keep {
                debug!(exchange = %self.exchange.name, pair = %name, "Removing closed pair");
            }
            keep
        });
        self.set_pairs_gauge(pairs.len());
        pairs.values().map(|handle| handle.pair().clone()).collect()
    }

    /// Begin shutting down if no open pair is registered.
    ///
    /// The registry is re-read under the status write lock, which
    /// `scrape_pair` needs (shared) to insert, so no registration can land
    /// between the check and the transition.
    async fn shutdown_if_no_pairs(&self) -> bool {
        let mut status = self.status.write().await;
        let pairs = self.pairs.read().await;
        if pairs.values().any(|handle| !handle.is_closed()) {
            return false;
        }
        status.begin_shutdown();
        true
    }

    async fn close_pairs(&self) {
        let pairs = self.pairs.read().await;
        for handle in pairs.values() {
            handle.close();
        }
    }
}

/// Generic per-exchange scraper.
///
/// Implements [`ExchangeScraper`] on top of any [`TradeSource`].
pub struct Scraper {
    shared: Arc<ScraperShared>,
    /// Sender parked here until the worker starts.
    pending_tx: Mutex<Option<mpsc::Sender<TradeRecord>>>,
    rx: Mutex<Option<mpsc::Receiver<TradeRecord>>>,
}

impl Scraper {
    /// Create a scraper for `exchange`.
    ///
    /// With `scrape` set the polling loop starts immediately, which must
    /// happen inside a tokio runtime. Otherwise call [`Scraper::start`]
    /// once pairs are registered.
    pub fn new(
        exchange: Exchange,
        source: Arc<dyn TradeSource>,
        resolver: Arc<dyn PairResolver>,
        options: ScraperOptions,
        scrape: bool,
    ) -> Self {
        let (tx, rx) = mpsc::channel(options.channel_capacity.max(1));
        let initial = if scrape {
            ScraperState::Running
        } else {
            ScraperState::Created
        };

        let shared = Arc::new(ScraperShared {
            exchange,
            source,
            resolver,
            options,
            pairs: RwLock::new(BTreeMap::new()),
            status: Arc::new(ScraperStatus::new(initial)),
            run: AtomicBool::new(scrape),
            cancel: CancellationToken::new(),
        });

        let pending_tx = if scrape {
            spawn_worker(Arc::clone(&shared), tx);
            None
        } else {
            Some(tx)
        };

        Self {
            shared,
            pending_tx: Mutex::new(pending_tx),
            rx: Mutex::new(Some(rx)),
        }
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> ScraperState {
        self.shared.status.state().await
    }

    /// Registered pairs (including ones closed since the last pass).
    pub async fn pairs(&self) -> Vec<ExchangePair> {
        let pairs = self.shared.pairs.read().await;
        pairs.values().map(|handle| handle.pair().clone()).collect()
    }

    /// Start the polling loop.
    ///
    /// # Errors
    /// `AlreadyRunning` if started before, `Closed` once closed.
    pub async fn start(&self) -> Result<(), ScraperError> {
        self.shared.status.begin_running().await?;

        let Some(tx) = self.take_pending_tx() else {
            // Only the single Created -> Running transition reaches here.
            let err = ScraperError::Worker("output sender missing".to_string());
            self.shared.status.finish(Some(err.clone())).await;
            return Err(err);
        };

        self.shared.run.store(true, Ordering::SeqCst);
        spawn_worker(Arc::clone(&self.shared), tx);
        Ok(())
    }

    /// Register `pair` for polling. Allowed while the loop runs.
    ///
    /// Re-registering a foreign name replaces (and closes) the previous
    /// handle.
    ///
    /// # Errors
    /// `Closed` once shutting down or closed, else any recorded error.
    pub async fn scrape_pair(&self, pair: ExchangePair) -> Result<PairScraper, ScraperError> {
        let _open = self.shared.status.ensure_open().await?;

        let handle = PairScraper::new(pair, Arc::clone(&self.shared.status));
        let name = handle.pair().foreign_name.clone();

        let mut pairs = self.shared.pairs.write().await;
        if let Some(previous) = pairs.insert(name.clone(), handle.clone()) {
            previous.close();
            debug!(exchange = %self.shared.exchange.name, pair = %name, "Replaced pair registration");
        }
        self.shared.set_pairs_gauge(pairs.len());
        info!(exchange = %self.shared.exchange.name, pair = %name, "Registered pair");

        Ok(handle)
    }

    /// Most recently recorded error.
    pub async fn error(&self) -> Option<ScraperError> {
        self.shared.status.error().await
    }

    /// Stop the loop and wait for it to exit.
    ///
    /// After this returns no further trades are sent and the output
    /// channel disconnects once drained. Idempotent.
    ///
    /// # Errors
    /// The terminal error if the worker died of something other than a
    /// close request.
    pub async fn close(&self) -> Result<(), ScraperError> {
        let prior = self.shared.status.begin_shutdown().await;

        self.shared.run.store(false, Ordering::SeqCst);
        self.shared.close_pairs().await;
        self.shared.cancel.cancel();

        if prior == ScraperState::Created {
            drop(self.take_pending_tx());
            self.shared.status.finish(None).await;
        }

        self.shared.status.wait_closed().await;
        info!(exchange = %self.shared.exchange.name, "Scraper closed");

        match self.shared.status.error().await {
            None | Some(ScraperError::ClosedByCaller) => Ok(()),
            Some(err) => Err(err),
        }
    }

    fn take_pending_tx(&self) -> Option<mpsc::Sender<TradeRecord>> {
        self.pending_tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

impl Drop for Scraper {
    fn drop(&mut self) {
        // A dropped handle must not leave an orphaned loop polling forever.
        self.shared.run.store(false, Ordering::SeqCst);
        self.shared.cancel.cancel();
    }
}

/// Spawn the worker plus the task that performs its terminal bookkeeping.
fn spawn_worker(shared: Arc<ScraperShared>, tx: mpsc::Sender<TradeRecord>) {
    let worker = Worker::new(Arc::clone(&shared), tx);
    shared.set_running_gauge(true);

    tokio::spawn(async move {
        let fatal = match tokio::spawn(worker.run()).await {
            Ok(fatal) => fatal,
            Err(e) => {
                error!(exchange = %shared.exchange.name, error = %e, "Scraper worker task failed");
                Some(ScraperError::Worker(e.to_string()))
            }
        };

        shared.set_running_gauge(false);
        shared.status.finish(fatal).await;
        info!(exchange = %shared.exchange.name, "Scraper loop exited");
    });
}

#[async_trait]
impl ExchangeScraper for Scraper {
    fn exchange_name(&self) -> &str {
        &self.shared.exchange.name
    }

    async fn fetch_available_pairs(&self) -> anyhow::Result<Vec<ExchangePair>> {
        self.shared.source.fetch_available_pairs().await
    }

    fn normalize_pair(&self, pair: ExchangePair) -> Result<ExchangePair, ScraperError> {
        self.shared.source.normalize_pair(pair)
    }

    fn fill_symbol_data(&self, symbol: &str) -> Asset {
        self.shared.source.fill_symbol_data(symbol)
    }

    async fn scrape_pair(&self, pair: ExchangePair) -> Result<PairScraper, ScraperError> {
        Self::scrape_pair(self, pair).await
    }

    async fn start(&self) -> Result<(), ScraperError> {
        Self::start(self).await
    }

    fn channel(&self) -> Option<mpsc::Receiver<TradeRecord>> {
        self.rx.lock().unwrap_or_else(PoisonError::into_inner).take()
    }

    async fn error(&self) -> Option<ScraperError> {
        Self::error(self).await
    }

    async fn close(&self) -> Result<(), ScraperError> {
        Self::close(self).await
    }
}
