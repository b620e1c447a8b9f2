//! Prometheus Metrics Registry - Scraper Observability
//!
//! Registers and exposes Prometheus metrics for Grafana dashboards.
//! Covers emitted trades, transient failures, poll cycle latency and
//! worker liveness per exchange.

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use prometheus::{Encoder, GaugeVec, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};
use tokio::sync::broadcast;
use tracing::{info, instrument, warn};

/// Centralized Prometheus metrics for all scrapers.
///
/// All metrics follow the naming convention `trade_scraper_*` and carry
/// an `exchange` label.
pub struct MetricsRegistry {
    /// Prometheus registry.
    registry: Registry,
    /// Trades sent on the output channel.
    pub trades_emitted: IntCounterVec,
    /// Failed trade-history fetches.
    pub fetch_failures: IntCounterVec,
    /// Trades dropped because a numeric field did not parse.
    pub decode_failures: IntCounterVec,
    /// Pair lookups that fell back to an unverified pair.
    pub resolve_failures: IntCounterVec,
    /// Duration of one full pass over all pairs (seconds).
    pub cycle_duration_seconds: HistogramVec,
    /// Pairs currently registered.
    pub registered_pairs: GaugeVec,
    /// Worker status (1 = running, 0 = stopped).
    pub scraper_running: GaugeVec,
}

impl MetricsRegistry {
    /// Create and register all Prometheus metrics.
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let trades_emitted = IntCounterVec::new(
            Opts::new("trade_scraper_trades_emitted_total", "Trades emitted on the output channel"),
            &["exchange", "pair"],
        )?;

        let fetch_failures = IntCounterVec::new(
            Opts::new("trade_scraper_fetch_failures_total", "Failed trade fetches"),
            &["exchange"],
        )?;

        let decode_failures = IntCounterVec::new(
            Opts::new(
                "trade_scraper_decode_failures_total",
                "Trades dropped due to unparseable price or volume",
            ),
            &["exchange"],
        )?;

        let resolve_failures = IntCounterVec::new(
            Opts::new(
                "trade_scraper_resolve_failures_total",
                "Pair lookups that failed and produced unverified trades",
            ),
            &["exchange"],
        )?;

        let cycle_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "trade_scraper_cycle_duration_seconds",
                "Duration of one polling pass over all pairs",
            )
            .buckets(vec![0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]),
            &["exchange"],
        )?;

        let registered_pairs = GaugeVec::new(
            Opts::new("trade_scraper_registered_pairs", "Pairs registered for polling"),
            &["exchange"],
        )?;

        let scraper_running = GaugeVec::new(
            Opts::new(
                "trade_scraper_running",
                "Worker status (1=running, 0=stopped)",
            ),
            &["exchange"],
        )?;

        // Register all metrics
        registry.register(Box::new(trades_emitted.clone()))?;
        registry.register(Box::new(fetch_failures.clone()))?;
        registry.register(Box::new(decode_failures.clone()))?;
        registry.register(Box::new(resolve_failures.clone()))?;
        registry.register(Box::new(cycle_duration_seconds.clone()))?;
        registry.register(Box::new(registered_pairs.clone()))?;
        registry.register(Box::new(scraper_running.clone()))?;

        Ok(Self {
            registry,
            trades_emitted,
            fetch_failures,
            decode_failures,
            resolve_failures,
            cycle_duration_seconds,
            registered_pairs,
            scraper_running,
        })
    }

    /// Render all metrics in the Prometheus text format.
    pub fn render(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            warn!(error = %e, "Failed to encode metrics");
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }

    /// Serve Prometheus metrics on the configured bind address.
    #[instrument(skip(self, shutdown_rx))]
    pub async fn serve(
        self: Arc<Self>,
        bind_address: String,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> anyhow::Result<()> {
        let metrics_self = Arc::clone(&self);

        let app = Router::new().route(
            "/metrics",
            get(move || {
                let metrics = Arc::clone(&metrics_self);
                async move { metrics.render() }
            }),
        );

        let listener = tokio::net::TcpListener::bind(&bind_address).await?;
        info!(address = %bind_address, "Prometheus metrics server started");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
            })
            .await?;

        Ok(())
    }
}
