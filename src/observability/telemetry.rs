//! Periodic runtime telemetry.
//!
//! Logs buffer pool occupancy, runtime task counts and traffic totals on a
//! fixed interval until shutdown.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::{self, Instant};

use crate::buffer::BufferPool;
use crate::observability::traffic::{to_mib, TrafficCounter};
use crate::routing::RouteTable;

pub struct TelemetryReporter {
    pool: BufferPool,
    traffic: Arc<TrafficCounter>,
    routes: Arc<RouteTable>,
    interval: Duration,
}

impl TelemetryReporter {
    pub fn new(
        pool: BufferPool,
        traffic: Arc<TrafficCounter>,
        routes: Arc<RouteTable>,
        interval: Duration,
    ) -> Self {
        Self {
            pool,
            traffic,
            routes,
            interval,
        }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = time::interval_at(Instant::now() + self.interval, self.interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => self.report(),
                _ = shutdown.recv() => {
                    tracing::debug!("Telemetry reporter stopping");
                    break;
                }
            }
        }
    }

    fn report(&self) {
        let runtime = tokio::runtime::Handle::current().metrics();
        let pooled = self.pool.pooled();
        tracing::info!(
            workers = runtime.num_workers(),
            alive_tasks = runtime.num_alive_tasks(),
            buffers_active = self.pool.active(),
            buffers_idle = pooled,
            buffers_idle_mib = %format!("{:.2}", to_mib((pooled * self.pool.size()) as u64)),
            routes = self.routes.len(),
            proxied_mib = %format!("{:.2}", self.traffic.total_mib()),
            "Telemetry"
        );
    }
}
