//! Per-request context.
//!
//! One [`ProxyRequestContext`] lives for each inbound request. It travels with
//! the response body and is dropped once the body has been fully written (or
//! the request was rejected or aborted), which emits the request's final log
//! line with its elapsed time.

use std::net::SocketAddr;
use std::time::Instant;

use axum::http::{Method, Request, StatusCode};

use crate::routing::RouteMatch;

pub const X_REQUEST_ID: &str = "x-request-id";

#[derive(Debug)]
pub struct ProxyRequestContext {
    method: Method,
    path: String,
    client: SocketAddr,
    request_id: String,
    route: Option<String>,
    upstream_path: Option<String>,
    status: Option<StatusCode>,
    started: Instant,
}

impl ProxyRequestContext {
    pub fn new(method: Method, path: impl Into<String>, client: SocketAddr) -> Self {
        Self {
            method,
            path: path.into(),
            client,
            request_id: "unknown".to_string(),
            route: None,
            upstream_path: None,
            status: None,
            started: Instant::now(),
        }
    }

    /// Capture method, path and request id from an inbound request.
    pub fn from_request<B>(request: &Request<B>, client: SocketAddr) -> Self {
        let mut context = Self::new(request.method().clone(), request.uri().path(), client);
        if let Some(id) = request
            .headers()
            .get(X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
        {
            context.request_id = id.to_string();
        }
        context
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The path as the client sent it.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn client(&self) -> SocketAddr {
        self.client
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Matched prefix, `None` while unmatched.
    pub fn route(&self) -> Option<&str> {
        self.route.as_deref()
    }

    pub fn upstream_path(&self) -> Option<&str> {
        self.upstream_path.as_deref()
    }

    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    pub fn started(&self) -> Instant {
        self.started
    }

    pub fn set_route(&mut self, route: &RouteMatch, upstream_path: &str) {
        self.route = Some(route.prefix.clone());
        self.upstream_path = Some(upstream_path.to_string());
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = Some(status);
    }
}

impl Drop for ProxyRequestContext {
    fn drop(&mut self) {
        tracing::info!(
            request_id = %self.request_id,
            method = %self.method,
            path = %self.path,
            client = %self.client,
            route = self.route.as_deref().unwrap_or("-"),
            status = self.status.map(|s| s.as_u16()),
            elapsed = ?self.started.elapsed(),
            "Request finished"
        );
    }
}
