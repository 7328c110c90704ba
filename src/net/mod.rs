//! Network layer subsystem.
//!
//! Socket accept and connection lifecycle belong to axum / axum-server; this
//! module only prepares the TLS material on both sides of the relay.

pub mod tls;
