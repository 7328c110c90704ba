//! Request rewriting ahead of upstream dispatch.
//!
//! # Responsibilities
//! - Resolve the request path against the route table
//! - Point matched requests at the upstream origin with the mapped path
//! - Present the request to the origin as a direct browser client: fixed
//!   header overrides, no proxy or hop-by-hop headers
//! - Drop content negotiation and conditional headers so the origin returns
//!   a full, uncompressed body
//!
//! Unmatched requests are left untouched; the caller answers them with 404.

use std::str::FromStr;

use axum::http::header::{
    ACCEPT_ENCODING, CONNECTION, HOST, IF_MODIFIED_SINCE, PROXY_AUTHENTICATE,
    PROXY_AUTHORIZATION, TE, TRAILER, TRANSFER_ENCODING, UPGRADE,
};
use axum::http::uri::{Authority, PathAndQuery, Scheme};
use axum::http::{HeaderMap, HeaderName, HeaderValue, Request, Uri, Version};
use thiserror::Error;

use crate::config::UpstreamConfig;
use crate::http::request::X_REQUEST_ID;
use crate::routing::{RouteMatch, RouteTable};

const KEEP_ALIVE: &str = "keep-alive";
const PROXY_CONNECTION: &str = "proxy-connection";

#[derive(Debug, Error)]
pub enum DirectorError {
    #[error("upstream origin '{0}' must be an absolute http(s) URI")]
    InvalidOrigin(String),

    #[error("invalid fixed header '{0}'")]
    InvalidHeader(String),
}

/// What the pipeline should do with a request after rewriting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// Dispatch upstream; the request now targets `upstream_path`.
    Forward {
        route: RouteMatch,
        upstream_path: String,
    },
    /// No route for the first path segment.
    NotFound,
}

#[derive(Debug, Clone)]
pub struct Director {
    scheme: Scheme,
    authority: Authority,
    host: HeaderValue,
    headers: Vec<(HeaderName, HeaderValue)>,
}

impl Director {
    pub fn new(config: &UpstreamConfig) -> Result<Self, DirectorError> {
        let invalid_origin = || DirectorError::InvalidOrigin(config.origin.clone());
        let origin = Uri::from_str(&config.origin).map_err(|_| invalid_origin())?;
        let scheme = origin.scheme().cloned().ok_or_else(invalid_origin)?;
        let authority = origin.authority().cloned().ok_or_else(invalid_origin)?;
        let host = HeaderValue::from_str(authority.as_str()).map_err(|_| invalid_origin())?;

        let headers = config
            .headers
            .iter()
            .map(|h| {
                let name = HeaderName::from_bytes(h.name.as_bytes())
                    .map_err(|_| DirectorError::InvalidHeader(h.name.clone()))?;
                let value = HeaderValue::from_str(&h.value)
                    .map_err(|_| DirectorError::InvalidHeader(h.name.clone()))?;
                Ok((name, value))
            })
            .collect::<Result<Vec<_>, DirectorError>>()?;

        Ok(Self {
            scheme,
            authority,
            host,
            headers,
        })
    }

    /// `scheme://authority` of the upstream origin.
    pub fn origin(&self) -> String {
        format!("{}://{}", self.scheme, self.authority)
    }

    /// Rewrite `request` in place for the upstream, or report that no route
    /// matches. A `NotFound` request is not modified.
    pub fn rewrite<B>(&self, request: &mut Request<B>, table: &RouteTable) -> Directive {
        let Some(route) = table.lookup(request.uri().path()) else {
            tracing::info!(path = %request.uri().path(), "No route for path");
            return Directive::NotFound;
        };

        let upstream_path = join_path(&route.target, &route.remainder);
        let Some(uri) = self.upstream_uri(&upstream_path, request.uri().query()) else {
            tracing::warn!(
                path = %request.uri().path(),
                upstream_path = %upstream_path,
                "Mapped path is not a valid URI"
            );
            return Directive::NotFound;
        };

        tracing::info!(
            route = %route.prefix,
            from = %request.uri().path(),
            to = %upstream_path,
            "Forwarding path"
        );

        *request.uri_mut() = uri;
        *request.version_mut() = Version::HTTP_11;
        self.rewrite_headers(request.headers_mut());

        Directive::Forward {
            route,
            upstream_path,
        }
    }

    fn upstream_uri(&self, path: &str, query: Option<&str>) -> Option<Uri> {
        let path_and_query = match query {
            Some(q) => PathAndQuery::from_str(&format!("{path}?{q}")),
            None => PathAndQuery::from_str(path),
        }
        .ok()?;

        Uri::builder()
            .scheme(self.scheme.clone())
            .authority(self.authority.clone())
            .path_and_query(path_and_query)
            .build()
            .ok()
    }

    fn rewrite_headers(&self, headers: &mut HeaderMap) {
        strip_hop_by_hop(headers);
        headers.remove(ACCEPT_ENCODING);
        headers.remove(IF_MODIFIED_SINCE);
        headers.remove(X_REQUEST_ID);

        headers.insert(HOST, self.host.clone());
        for (name, value) in &self.headers {
            headers.insert(name.clone(), value.clone());
        }
    }
}

/// Remove hop-by-hop headers, including any named by `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|token| HeaderName::from_bytes(token.trim().as_bytes()).ok())
        .collect();
    for name in listed {
        headers.remove(name);
    }

    for name in [
        CONNECTION,
        PROXY_AUTHENTICATE,
        PROXY_AUTHORIZATION,
        TE,
        TRAILER,
        TRANSFER_ENCODING,
        UPGRADE,
    ] {
        headers.remove(name);
    }
    headers.remove(KEEP_ALIVE);
    headers.remove(PROXY_CONNECTION);
}

/// Join `target` and `remainder` under `/` and clean the result: empty and
/// `.` segments vanish, `..` removes the previous segment but never climbs
/// above the root, and no trailing slash is kept.
pub fn join_path(target: &str, remainder: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in target.split('/').chain(remainder.split('/')) {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    format!("/{}", segments.join("/"))
}
