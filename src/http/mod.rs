//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, request id, tracing)
//!     → request.rs (per-request context, final log line)
//!     → director.rs (route lookup, URI and header rewrite)
//!     → upstream client (hyper-util, HTTPS to the origin)
//!     → response.rs (CORS, hop-by-hop cleanup, chunked policy)
//!     → body.rs (copy through a pooled buffer)
//!     → Send to client
//! ```

pub mod body;
pub mod director;
pub mod request;
pub mod response;
pub mod server;

pub use director::{Director, DirectorError, Directive};
pub use request::{ProxyRequestContext, X_REQUEST_ID};
pub use response::ResponseShaper;
pub use server::{AppState, HttpServer, ServerError};
