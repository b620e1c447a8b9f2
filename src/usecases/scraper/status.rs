//! Scraper lifecycle state and terminal error.
//!
//! `{state, error}` is the only state mutated both by the worker and by
//! external callers, so it lives behind one lock. Readers take the read
//! lock; the worker exit path and `close()` take the write lock.

use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard, watch};

use crate::domain::error::ScraperError;

/// Lifecycle of a scraper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScraperState {
    /// Constructed, loop not started.
    Created,
    /// Loop running.
    Running,
    /// Stop requested or fatal condition hit; loop still exiting.
    ShuttingDown,
    /// Loop exited and all loop-owned state released.
    Closed,
}

impl std::fmt::Display for ScraperState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Running => write!(f, "running"),
            Self::ShuttingDown => write!(f, "shutting_down"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

#[derive(Debug)]
pub(crate) struct StatusInner {
    state: ScraperState,
    error: Option<ScraperError>,
}

impl StatusInner {
    /// Move `Created`/`Running` to `ShuttingDown`, returning the prior state.
    pub(crate) const fn begin_shutdown(&mut self) -> ScraperState {
        let prior = self.state;
        if matches!(prior, ScraperState::Created | ScraperState::Running) {
            self.state = ScraperState::ShuttingDown;
        }
        prior
    }
}

/// Shared status of one scraper.
///
/// Invariant: `state == Closed` implies `error.is_some()`.
#[derive(Debug)]
pub struct ScraperStatus {
    inner: RwLock<StatusInner>,
    done_tx: watch::Sender<bool>,
}

impl ScraperStatus {
    pub(crate) fn new(state: ScraperState) -> Self {
        let (done_tx, _) = watch::channel(false);
        Self {
            inner: RwLock::new(StatusInner { state, error: None }),
            done_tx,
        }
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> ScraperState {
        self.inner.read().await.state
    }

    /// Most recently recorded error.
    pub async fn error(&self) -> Option<ScraperError> {
        self.inner.read().await.error.clone()
    }

    /// Whether the scraper reached `Closed`.
    pub async fn is_closed(&self) -> bool {
        self.state().await == ScraperState::Closed
    }

    /// Hold the read lock while the scraper accepts registrations.
    ///
    /// Keeping the guard alive across the registration makes it atomic with
    /// respect to `close()`, which needs the write lock.
    pub(crate) async fn ensure_open(&self) -> Result<RwLockReadGuard<'_, StatusInner>, ScraperError> {
        let inner = self.inner.read().await;
        if matches!(inner.state, ScraperState::ShuttingDown | ScraperState::Closed) {
            return Err(ScraperError::Closed);
        }
        if let Some(err) = &inner.error {
            return Err(err.clone());
        }
        Ok(inner)
    }

    /// `Created -> Running`.
    pub(crate) async fn begin_running(&self) -> Result<(), ScraperError> {
        let mut inner = self.inner.write().await;
        match inner.state {
            ScraperState::Created => {
                inner.state = ScraperState::Running;
                Ok(())
            }
            ScraperState::Running => Err(ScraperError::AlreadyRunning),
            ScraperState::ShuttingDown | ScraperState::Closed => Err(ScraperError::Closed),
        }
    }

    /// Move `Created`/`Running` to `ShuttingDown`, returning the prior state.
    pub(crate) async fn begin_shutdown(&self) -> ScraperState {
        self.inner.write().await.begin_shutdown()
    }

    /// Exclusive access, blocking registrations until the guard drops.
    pub(crate) async fn write(&self) -> RwLockWriteGuard<'_, StatusInner> {
        self.inner.write().await
    }

    /// Terminal bookkeeping: record the final error, mark closed, release
    /// waiters. Runs once; later calls are no-ops.
    pub(crate) async fn finish(&self, fatal: Option<ScraperError>) {
        let mut inner = self.inner.write().await;
        if inner.state == ScraperState::Closed {
            return;
        }
        match fatal {
            Some(err) => {
                debug_assert!(err.is_terminal(), "non-terminal error ended a worker: {err}");
                inner.error = Some(err);
            }
            None => {
                inner.error.get_or_insert(ScraperError::ClosedByCaller);
            }
        }
        inner.state = ScraperState::Closed;
        drop(inner);

        self.done_tx.send_replace(true);
    }

    /// Wait until `finish` has run.
    pub(crate) async fn wait_closed(&self) {
        let mut done_rx = self.done_tx.subscribe();
        // The sender lives in `self`, so this only returns once done.
        let _ = done_rx.wait_for(|done| *done).await;
    }
}
