//! Trade Scrapers - Entry Point
//!
//! Polls every enabled exchange for new trades and appends them to the
//! JSONL trade log. Runs until SIGINT.
//!
//! Wiring sequence:
//! 1. Load config (SCRAPER_CONFIG or config.toml) + validate
//! 2. Init tracing (JSON structured logging)
//! 3. Spawn metrics server and health server (/live + /ready)
//! 4. Seed the pair cache from configured pairs
//! 5. Create one scraper per enabled exchange, register pairs, start
//! 6. Drain the shared trade channel into the trade log
//! 7. Wait for SIGINT -> close all scrapers -> flush sink -> exit

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info, warn};

use trade_scrapers::adapters::metrics::{HealthServer, HealthState, MetricsRegistry};
use trade_scrapers::adapters::persistence::TradeLogger;
use trade_scrapers::adapters::resolver::InMemoryPairCache;
use trade_scrapers::config::{self, AppConfig};
use trade_scrapers::domain::trade::TradeRecord;
use trade_scrapers::usecases::{ScraperOptions, ScraperSupervisor, create_scraper};

/// Shared sink channel capacity.
const SINK_CAPACITY: usize = 1024;

#[tokio::main]
async fn main() -> Result<()> {
    // ── 1. Load configuration ───────────────────────────────
    let config_path = config::loader::config_path();
    let config = config::loader::load_config(&config_path).context("Failed to load configuration")?;

    // ── 2. Initialize structured logging ────────────────────
    init_tracing(&config);

    info!(
        name = %config.service.name,
        version = env!("CARGO_PKG_VERSION"),
        config = %config_path,
        exchanges = config.enabled_exchanges().count(),
        "Starting trade scrapers"
    );

    // ── 3. Shutdown signal, metrics, health ─────────────────
    let (shutdown_tx, _shutdown_rx) = broadcast::channel::<()>(1);
    let health = Arc::new(HealthState::new());

    let metrics = if config.metrics.enabled {
        let registry = Arc::new(MetricsRegistry::new().context("Failed to create metrics registry")?);
        let server = Arc::clone(&registry);
        let bind = config.metrics.bind_address.clone();
        let rx = shutdown_tx.subscribe();
        tokio::spawn(async move {
            if let Err(e) = server.serve(bind, rx).await {
                error!(error = %e, "Metrics server failed");
            }
        });
        Some(registry)
    } else {
        None
    };

    let health_server = HealthServer::new(Arc::clone(&health), config.metrics.health_port);
    let health_shutdown = shutdown_tx.subscribe();
    let health_handle = tokio::spawn(async move {
        if let Err(e) = health_server.run(health_shutdown).await {
            error!(error = %e, "Health server failed");
        }
    });

    // ── 4. Pair cache ───────────────────────────────────────
    let resolver = Arc::new(InMemoryPairCache::from_config(&config).await);
    info!(pairs = resolver.len().await, "Pair cache seeded");

    // ── 5. Trade sink ───────────────────────────────────────
    let logger = TradeLogger::new(&config.persistence.data_dir)
        .await
        .context("Failed to create trade logger")?;
    let (sink_tx, sink_rx) = mpsc::channel::<TradeRecord>(SINK_CAPACITY);
    let sink_handle = tokio::spawn(run_sink(logger, sink_rx, Arc::clone(&health)));

    // ── 6. Exchange scrapers ────────────────────────────────
    let mut supervisor = ScraperSupervisor::new(sink_tx, Arc::clone(&health));
    for exchange in config.enabled_exchanges() {
        let mut options = ScraperOptions::default()
            .with_batch_delay(exchange.batch_delay(&config.scraper))
            .with_channel_capacity(config.scraper.channel_capacity);
        if let Some(metrics) = &metrics {
            options = options.with_metrics(Arc::clone(metrics));
        }

        let scraper = match create_scraper(exchange, &config.http, resolver.clone(), options) {
            Ok(scraper) => scraper,
            Err(e) => {
                error!(exchange = %exchange.name, error = %e, "Failed to create scraper");
                continue;
            }
        };
        if let Err(e) = supervisor.launch(exchange, scraper).await {
            error!(exchange = %exchange.name, error = %e, "Failed to launch scraper");
        }
    }

    anyhow::ensure!(!supervisor.exchanges().is_empty(), "No exchange scraper could be started");
    info!(exchanges = ?supervisor.exchanges(), "All scrapers running");

    // ── 7. Wait for SIGINT ──────────────────────────────────
    signal::ctrl_c().await.context("Failed to listen for SIGINT")?;
    info!("SIGINT received, initiating graceful shutdown");

    let _ = shutdown_tx.send(());

    let failures = supervisor.close_all().await;
    if !failures.is_empty() {
        warn!(failed = failures.len(), "Some scrapers ended with an error");
    }
    // The supervisor held the last sink sender; the sink drains and exits.
    drop(supervisor);

    if tokio::time::timeout(Duration::from_secs(10), sink_handle).await.is_err() {
        warn!("Trade sink did not drain in time");
    }
    let _ = tokio::time::timeout(Duration::from_secs(5), health_handle).await;

    info!("Shutdown complete");
    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.service.log_level));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if config.service.json_logs {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Append every received trade to the trade log.
async fn run_sink(logger: TradeLogger, mut rx: mpsc::Receiver<TradeRecord>, health: Arc<HealthState>) {
    let mut written: u64 = 0;
    while let Some(trade) = rx.recv().await {
        match logger.append_trade(&trade).await {
            Ok(()) => {
                written += 1;
                health.set_sink_healthy(true);
            }
            Err(e) => {
                error!(source = %trade.source, pair = %trade.pair, error = %e, "Failed to persist trade");
                health.set_sink_healthy(false);
            }
        }
    }
    info!(written, "Trade sink drained");
}
