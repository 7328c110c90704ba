//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (intervals > 0, buffer size > 0)
//! - Check the origin URL and fixed headers are usable as-is
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use axum::http::{HeaderName, HeaderValue};
use thiserror::Error;
use url::Url;

use crate::config::schema::ProxyConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    match Url::parse(&config.upstream.origin) {
        Ok(url) => {
            if !matches!(url.scheme(), "http" | "https") {
                errors.push(ValidationError::new("upstream.origin", "scheme must be http or https"));
            }
            if url.host_str().is_none() {
                errors.push(ValidationError::new("upstream.origin", "missing host"));
            }
        }
        Err(e) => errors.push(ValidationError::new("upstream.origin", e.to_string())),
    }

    for (i, header) in config.upstream.headers.iter().enumerate() {
        if HeaderName::from_bytes(header.name.as_bytes()).is_err() {
            errors.push(ValidationError::new(
                format!("upstream.headers[{i}].name"),
                format!("'{}' is not a valid header name", header.name),
            ));
        }
        if HeaderValue::from_str(&header.value).is_err() {
            errors.push(ValidationError::new(
                format!("upstream.headers[{i}].value"),
                "not a valid header value",
            ));
        }
    }

    if config.upstream.max_connections == 0 {
        errors.push(ValidationError::new("upstream.max_connections", "must be greater than 0"));
    }
    if config.upstream.response_header_secs == 0 {
        errors.push(ValidationError::new("upstream.response_header_secs", "must be greater than 0"));
    }
    for (field, secs) in [
        ("upstream.body_idle_secs", config.upstream.body_idle_secs),
        ("listener.header_read_timeout_secs", config.listener.header_read_timeout_secs),
        ("listener.idle_timeout_secs", config.listener.idle_timeout_secs),
        ("listener.stream_timeout_secs", config.listener.stream_timeout_secs),
    ] {
        if secs == 0 {
            errors.push(ValidationError::new(field, "must be greater than 0"));
        }
    }
    if config.routes.path.is_empty() {
        errors.push(ValidationError::new("routes.path", "must not be empty"));
    }
    if config.routes.reload_interval_secs == 0 {
        errors.push(ValidationError::new("routes.reload_interval_secs", "must be greater than 0"));
    }
    if config.buffer.size_bytes == 0 {
        errors.push(ValidationError::new("buffer.size_bytes", "must be greater than 0"));
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new("observability.metrics_address", "not a socket address"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
