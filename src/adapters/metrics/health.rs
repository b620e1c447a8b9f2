//! Health Check Server - Liveness and Readiness Probes
//!
//! Exposes /live and /ready via axum 0.7. The service is ready while at
//! least one exchange scraper is polling and the trade sink can write.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use tokio::sync::broadcast;
use tracing::{info, instrument};

/// Shared health state updated by the supervisor and the sink.
#[derive(Debug)]
pub struct HealthState {
    /// Scrapers whose polling loop is currently alive.
    running_scrapers: AtomicUsize,
    /// Whether the last trade write succeeded.
    sink_healthy: AtomicBool,
}

impl Default for HealthState {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthState {
    pub const fn new() -> Self {
        Self {
            running_scrapers: AtomicUsize::new(0),
            sink_healthy: AtomicBool::new(true),
        }
    }

    pub fn scraper_started(&self) {
        self.running_scrapers.fetch_add(1, Ordering::Relaxed);
    }

    /// Saturates at zero.
    pub fn scraper_stopped(&self) {
        let _ = self
            .running_scrapers
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
    }

    pub fn running_scrapers(&self) -> usize {
        self.running_scrapers.load(Ordering::Relaxed)
    }

    pub fn set_sink_healthy(&self, healthy: bool) {
        self.sink_healthy.store(healthy, Ordering::Relaxed);
    }

    pub fn is_ready(&self) -> bool {
        self.running_scrapers() > 0 && self.sink_healthy.load(Ordering::Relaxed)
    }
}

/// Axum-based health check HTTP server.
pub struct HealthServer {
    state: Arc<HealthState>,
    port: u16,
}

impl HealthServer {
    pub fn new(state: Arc<HealthState>, port: u16) -> Self {
        Self { state, port }
    }

    fn router(state: Arc<HealthState>) -> Router {
        Router::new()
            .route("/live", get(Self::liveness))
            .route("/ready", get(Self::readiness))
            .with_state(state)
    }

    /// Serve until the shutdown broadcast fires.
    #[instrument(skip(self, shutdown_rx))]
    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) -> anyhow::Result<()> {
        let app = Self::router(Arc::clone(&self.state));

        let addr = format!("0.0.0.0:{}", self.port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;

        info!(address = %addr, "Health server started");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
            })
            .await?;

        Ok(())
    }

    async fn liveness() -> impl IntoResponse {
        (StatusCode::OK, "OK")
    }

    async fn readiness(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
        if state.is_ready() {
            (StatusCode::OK, "READY")
        } else {
            (StatusCode::SERVICE_UNAVAILABLE, "NOT READY")
        }
    }
}
