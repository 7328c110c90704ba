//! Response shaping after upstream dispatch.
//!
//! # Responsibilities
//! - Force `Access-Control-Allow-Origin: *` on every proxied response
//! - Drop the origin's hop-by-hop headers, keeping its chunked framing
//! - Switch large or media responses to chunked transfer
//! - Log the outcome with the declared size and the process traffic total
//!
//! # Design Decisions
//! - Header-only mutation; shaping never fails a request
//! - Content types compare on the media type essence, parameters ignored
//! - Responses that never carry a body keep their framing headers

use std::sync::Arc;

use axum::http::header::{ACCESS_CONTROL_ALLOW_ORIGIN, CONTENT_LENGTH, CONTENT_TYPE, TRANSFER_ENCODING};
use axum::http::{HeaderMap, HeaderValue, Method, Response, StatusCode};

use crate::config::ResponseConfig;
use crate::http::director::strip_hop_by_hop;
use crate::http::request::ProxyRequestContext;
use crate::observability::traffic::{to_mib, TrafficCounter};

#[derive(Debug)]
pub struct ResponseShaper {
    chunked_threshold: u64,
    streaming_types: Vec<String>,
    traffic: Arc<TrafficCounter>,
}

impl ResponseShaper {
    pub fn new(config: &ResponseConfig, traffic: Arc<TrafficCounter>) -> Self {
        Self {
            chunked_threshold: config.chunked_threshold_bytes,
            streaming_types: config
                .streaming_content_types
                .iter()
                .map(|t| t.trim().to_ascii_lowercase())
                .collect(),
            traffic,
        }
    }

    /// Shape `response` in place. Returns whether chunked transfer was forced.
    pub fn shape<B>(&self, response: &mut Response<B>, context: &ProxyRequestContext) -> bool {
        let status = response.status();
        let headers = response.headers_mut();
        headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));

        let upstream_chunked = is_chunked(headers);
        strip_hop_by_hop(headers);
        if upstream_chunked {
            headers.insert(TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        }

        let declared = content_length(headers);
        let forced = can_have_body(context.method(), status)
            && !upstream_chunked
            && (self.is_streaming_type(headers)
                || declared.is_some_and(|len| len >= self.chunked_threshold));
        if forced {
            headers.remove(CONTENT_LENGTH);
            headers.insert(TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        }

        tracing::info!(
            method = %context.method(),
            status = status.as_u16(),
            path = %context.path(),
            size_mib = %format!("{:.2}", to_mib(declared.unwrap_or(0))),
            total_mib = %format!("{:.2}", self.traffic.total_mib()),
            chunked = forced,
            "Response shaped"
        );
        forced
    }

    fn is_streaming_type(&self, headers: &HeaderMap) -> bool {
        headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or("").trim().to_ascii_lowercase())
            .is_some_and(|essence| self.streaming_types.iter().any(|t| *t == essence))
    }
}

fn content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

fn is_chunked(headers: &HeaderMap) -> bool {
    headers
        .get_all(TRANSFER_ENCODING)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|coding| coding.trim().eq_ignore_ascii_case("chunked"))
}

fn can_have_body(method: &Method, status: StatusCode) -> bool {
    method != Method::HEAD
        && !status.is_informational()
        && status != StatusCode::NO_CONTENT
        && status != StatusCode::NOT_MODIFIED
}
