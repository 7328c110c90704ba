//! Periodic route reloading.
//!
//! # Responsibilities
//! - Re-check the route declaration on a fixed period
//! - React to out-of-band nudges (file watcher, SIGHUP)
//! - Log and count every outcome; never stop on a failed reload

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::observability::metrics;
use crate::routing::table::{ReloadOutcome, RouteError, RouteSource, RouteTable};

/// Background task that keeps a [`RouteTable`] in sync with its source.
pub struct RouteReloader {
    table: Arc<RouteTable>,
    source: RouteSource,
    interval: Duration,
    nudges: Option<mpsc::Receiver<()>>,
}

impl RouteReloader {
    pub fn new(table: Arc<RouteTable>, source: RouteSource, interval: Duration) -> Self {
        Self {
            table,
            source,
            interval,
            nudges: None,
        }
    }

    /// Also re-check whenever a message arrives on `nudges`.
    pub fn with_nudges(mut self, nudges: mpsc::Receiver<()>) -> Self {
        self.nudges = Some(nudges);
        self
    }

    /// Run one check and record its outcome.
    pub fn check(&self) -> Result<ReloadOutcome, RouteError> {
        let result = self.table.reload_if_changed(&self.source);
        match &result {
            Ok(ReloadOutcome::Unchanged) => {
                tracing::trace!(path = ?self.source.path(), "Routes unchanged");
            }
            Ok(ReloadOutcome::Reloaded(count)) => {
                tracing::info!(
                    path = ?self.source.path(),
                    routes = count,
                    version = self.table.snapshot().version(),
                    "Routes reloaded"
                );
                metrics::record_route_reload("reloaded");
            }
            Err(e) => {
                tracing::warn!(error = %e, "Route reload failed, keeping current routes");
                metrics::record_route_reload("failed");
            }
        }
        result
    }

    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            path = ?self.source.path(),
            interval = ?self.interval,
            "Route reloader starting"
        );

        // The initial load already happened; the first check is one period out.
        let mut ticker = time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut nudges = self.nudges.take();

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let _ = self.check();
                }
                Some(()) = next_nudge(&mut nudges) => {
                    let _ = self.check();
                }
                _ = shutdown.recv() => {
                    tracing::info!("Route reloader received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}

async fn next_nudge(nudges: &mut Option<mpsc::Receiver<()>>) -> Option<()> {
    match nudges {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
