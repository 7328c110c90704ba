//! TLS-terminating media relay.
//!
//! Requests are routed by the first path segment through a hot-reloadable
//! prefix table, rewritten to look like direct browser traffic, sent to a
//! single upstream origin, and streamed back through pooled buffers.

pub mod buffer;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod routing;

pub use buffer::BufferPool;
pub use config::schema::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use routing::RouteTable;
