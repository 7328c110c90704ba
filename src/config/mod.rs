//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable)
//!     → shared by value with each subsystem at startup
//!
//! Route declaration (JSON) is separate and hot-reloaded:
//!     watcher.rs detects change (optional)
//!     → routing::reloader re-checks the modification time
//!     → routing::table swaps in a new snapshot
//! ```
//!
//! # Design Decisions
//! - Process config is immutable once loaded; only routes reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, ConfigError};
pub use schema::{
    BufferConfig, FixedHeader, ListenerConfig, ObservabilityConfig, ProxyConfig, ResponseConfig,
    RoutesConfig, TlsConfig, UpstreamConfig,
};
