//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the relay.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the relay.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address, TLS).
    pub listener: ListenerConfig,

    /// The single upstream origin and how to reach it.
    pub upstream: UpstreamConfig,

    /// Route declaration source and reload cadence.
    pub routes: RoutesConfig,

    /// Response body buffer pool.
    pub buffer: BufferConfig,

    /// Response shaping policy.
    pub response: ResponseConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8443").
    pub bind_address: String,

    /// Optional TLS configuration. Plain HTTP when absent.
    pub tls: Option<TlsConfig>,

    /// Seconds to wait for in-flight requests on shutdown.
    pub shutdown_grace_secs: u64,

    /// Time allowed for a client to send a full HTTP/1 request head.
    pub header_read_timeout_secs: u64,

    /// Idle HTTP/2 connections are pinged after this many seconds and
    /// closed if the ping goes unanswered.
    pub idle_timeout_secs: u64,

    /// Upper bound on streaming one response body to a client.
    pub stream_timeout_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8443".to_string(),
            tls: None,
            shutdown_grace_secs: 10,
            header_read_timeout_secs: 30,
            idle_timeout_secs: 120,
            stream_timeout_secs: 600,
        }
    }
}

impl ListenerConfig {
    pub fn header_read_timeout(&self) -> Duration {
        Duration::from_secs(self.header_read_timeout_secs)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn stream_timeout(&self) -> Duration {
        Duration::from_secs(self.stream_timeout_secs)
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// A header applied to every routed request.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct FixedHeader {
    pub name: String,
    pub value: String,
}

impl FixedHeader {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Upstream origin configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base scheme and host every matched request is sent to.
    pub origin: String,

    /// Header overrides, applied in order.
    pub headers: Vec<FixedHeader>,

    /// Accept any certificate presented by the origin.
    pub skip_tls_verify: bool,

    /// Maximum concurrent requests in flight to the origin.
    pub max_connections: usize,

    /// Maximum idle pooled connections kept to the origin.
    pub pool_max_idle_per_host: usize,

    /// Idle pooled connection lifetime in seconds.
    pub pool_idle_secs: u64,

    /// TCP connect timeout in seconds.
    pub connect_secs: u64,

    /// TCP keepalive interval in seconds.
    pub keepalive_secs: u64,

    /// Time allowed for an upstream slot and the origin's response headers,
    /// in seconds.
    pub response_header_secs: u64,

    /// A response body read or client write stalled this long ends the stream.
    pub body_idle_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            origin: "https://www.example.com".to_string(),
            headers: Vec::new(),
            skip_tls_verify: false,
            max_connections: 16,
            pool_max_idle_per_host: 16,
            pool_idle_secs: 90,
            connect_secs: 30,
            keepalive_secs: 60,
            response_header_secs: 60,
            body_idle_secs: 60,
        }
    }
}

impl UpstreamConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_secs)
    }

    pub fn response_header_timeout(&self) -> Duration {
        Duration::from_secs(self.response_header_secs)
    }

    pub fn body_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.body_idle_secs)
    }
}

/// Route declaration source.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RoutesConfig {
    /// Path to the JSON route declaration.
    pub path: String,

    /// Interval between modification checks, in seconds.
    pub reload_interval_secs: u64,

    /// Also trigger a check when the file system reports a change.
    pub watch: bool,
}

impl Default for RoutesConfig {
    fn default() -> Self {
        Self {
            path: "routes.json".to_string(),
            reload_interval_secs: 10,
            watch: false,
        }
    }
}

impl RoutesConfig {
    pub fn reload_interval(&self) -> Duration {
        Duration::from_secs(self.reload_interval_secs)
    }
}

/// Buffer pool configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BufferConfig {
    /// Size of every pooled buffer in bytes.
    pub size_bytes: usize,

    /// Seconds with zero checked-out buffers before the pool is trimmed.
    pub idle_timeout_secs: u64,

    /// Maximum number of idle buffers kept for reuse.
    pub max_idle: usize,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            size_bytes: 1024 * 1024,
            idle_timeout_secs: 60,
            max_idle: 32,
        }
    }
}

impl BufferConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

/// Response shaping configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ResponseConfig {
    /// Declared length at or above which chunked transfer is forced.
    pub chunked_threshold_bytes: u64,

    /// Content types that are always streamed chunked.
    pub streaming_content_types: Vec<String>,
}

impl Default for ResponseConfig {
    fn default() -> Self {
        Self {
            chunked_threshold_bytes: 1024 * 1024,
            streaming_content_types: vec![
                "video/mp4".to_string(),
                "video/webm".to_string(),
                "application/octet-stream".to_string(),
            ],
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Append log lines to this file in addition to stdout.
    pub log_file: Option<String>,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,

    /// Seconds between telemetry reports; 0 disables them.
    pub telemetry_interval_secs: u64,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_file: None,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
            telemetry_interval_secs: 300,
        }
    }
}
