//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events, console + optional file)
//!     → metrics.rs (counters, gauges, histograms)
//!     → traffic.rs (process total of proxied bytes)
//!
//! Consumers:
//!     → stdout and the configured log file
//!     → Metrics endpoint (Prometheus scrape, optional)
//!     → telemetry.rs (periodic summary log line)
//! ```

pub mod logging;
pub mod metrics;
pub mod telemetry;
pub mod traffic;

pub use telemetry::TelemetryReporter;
pub use traffic::TrafficCounter;
