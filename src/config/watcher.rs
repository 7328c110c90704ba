//! Route file watcher.
//!
//! Turns file system notifications for the route declaration into "check now"
//! nudges for the reloader. The reloader still compares modification times,
//! so a spurious event costs one `stat` and nothing else.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

/// A watcher that monitors the route declaration for changes.
pub struct RouteWatcher {
    path: PathBuf,
    nudge_tx: mpsc::Sender<()>,
}

impl RouteWatcher {
    /// Create a watcher that sends nudges on `nudge_tx`.
    pub fn new(path: &Path, nudge_tx: mpsc::Sender<()>) -> Self {
        Self {
            path: path.to_path_buf(),
            nudge_tx,
        }
    }

    /// Start watching the file. The returned watcher must be kept alive.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.nudge_tx;

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if event.kind.is_modify() || event.kind.is_create() {
                        tracing::debug!(paths = ?event.paths, "Route file change detected");
                        // A full channel already holds a pending nudge.
                        let _ = tx.try_send(());
                    }
                }
                Err(e) => tracing::warn!(error = %e, "Route watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Route watcher started");
        Ok(watcher)
    }
}
