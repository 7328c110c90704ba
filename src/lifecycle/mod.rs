//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Logging → Route table → Metrics → Server → Background tasks
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Broadcast → Reloader/telemetry stop, server drains → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//!     SIGHUP → Re-check the route file now
//! ```
//!
//! # Design Decisions
//! - Fail fast: a bad config or unreadable route file is fatal at startup
//! - After startup, route reload failures are logged and the table is kept

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
