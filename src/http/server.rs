//! HTTP server setup and the proxy pipeline.
//!
//! # Responsibilities
//! - Create the Axum Router; every path and method goes to the pipeline
//! - Wire up middleware (request id, tracing)
//! - Build the upstream client (HTTPS, pooled, bounded concurrency)
//! - Serve plain HTTP or TLS with graceful shutdown
//!
//! # Pipeline
//! ```text
//! request → Director (404 if unmatched) → upstream slot → origin
//!         → ResponseShaper → pooled body copy → client
//! ```
//! Waiting for an upstream slot and for the origin's response headers share
//! one deadline; missing it, or any upstream failure, answers 502. Requests
//! are never retried. Body transfers are bounded by [`StreamLimits`].

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use axum_server::tls_rustls::RustlsConfig;
use axum_server::Handle;
use hyper_rustls::HttpsConnector;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::{TokioExecutor, TokioTimer},
    server::conn::auto,
};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, Semaphore};
use tokio::time;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::buffer::BufferPool;
use crate::config::{ListenerConfig, ProxyConfig, UpstreamConfig};
use crate::http::body::{pooled_body, StreamLimits};
use crate::http::director::{Director, DirectorError, Directive};
use crate::http::request::ProxyRequestContext;
use crate::http::response::ResponseShaper;
use crate::net::tls::{self, TlsError};
use crate::observability::{metrics, TrafficCounter};
use crate::routing::RouteTable;

const NOT_FOUND_BODY: &str = "404 page not found\n";
const PING_TIMEOUT: Duration = Duration::from_secs(20);

pub type UpstreamClient = Client<HttpsConnector<HttpConnector>, Body>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Director(#[from] DirectorError),

    #[error(transparent)]
    Tls(#[from] TlsError),
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub routes: Arc<RouteTable>,
    pub director: Arc<Director>,
    pub shaper: Arc<ResponseShaper>,
    pub buffers: BufferPool,
    pub traffic: Arc<TrafficCounter>,
    pub client: UpstreamClient,
    /// One permit per in-flight upstream exchange.
    pub upstream_slots: Arc<Semaphore>,
    /// Deadline for an upstream slot plus the origin's response headers.
    pub response_header_timeout: Duration,
    pub stream_limits: StreamLimits,
}

/// HTTP server for the relay.
pub struct HttpServer {
    router: Router,
    config: ProxyConfig,
    state: AppState,
}

impl HttpServer {
    /// Build the pipeline over a loaded route table.
    pub fn new(config: ProxyConfig, routes: Arc<RouteTable>) -> Result<Self, ServerError> {
        let traffic = Arc::new(TrafficCounter::new());
        let director = Arc::new(Director::new(&config.upstream)?);
        let shaper = Arc::new(ResponseShaper::new(&config.response, traffic.clone()));
        let client = build_client(&config.upstream)?;

        let state = AppState {
            routes,
            director,
            shaper,
            buffers: BufferPool::from_config(&config.buffer),
            traffic,
            client,
            upstream_slots: Arc::new(Semaphore::new(config.upstream.max_connections)),
            response_header_timeout: config.upstream.response_header_timeout(),
            stream_limits: StreamLimits {
                idle: config.upstream.body_idle_timeout(),
                ceiling: config.listener.stream_timeout(),
            },
        };

        tracing::info!(
            origin = %state.director.origin(),
            routes = state.routes.len(),
            max_connections = config.upstream.max_connections,
            "Proxy pipeline ready"
        );

        let router = Self::build_router(state.clone());
        Ok(Self {
            router,
            config,
            state,
        })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(proxy_handler))
            .route("/", any(proxy_handler))
            .with_state(state)
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// The router, for serving on a custom transport or driving in tests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Serve plain HTTP on `listener` until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let handle = self.drain_on(shutdown);
        let mut server = axum_server::from_tcp(listener.into_std()?).handle(handle);
        apply_timeouts(server.http_builder(), &self.config.listener);
        server
            .serve(self.router.into_make_service_with_connect_info::<SocketAddr>())
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Serve HTTPS on `addr` until `shutdown` fires.
    pub async fn run_tls(
        self,
        addr: SocketAddr,
        tls: RustlsConfig,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        tracing::info!(address = %addr, "HTTPS server starting");

        let handle = self.drain_on(shutdown);
        let mut server = axum_server::bind_rustls(addr, tls).handle(handle);
        apply_timeouts(server.http_builder(), &self.config.listener);
        server
            .serve(self.router.into_make_service_with_connect_info::<SocketAddr>())
            .await?;

        tracing::info!("HTTPS server stopped");
        Ok(())
    }

    /// A server handle that stops accepting when `shutdown` fires and gives
    /// in-flight connections the configured grace period.
    fn drain_on(&self, mut shutdown: broadcast::Receiver<()>) -> Handle {
        let handle = Handle::new();
        let grace = Duration::from_secs(self.config.listener.shutdown_grace_secs);
        let shutdown_handle = handle.clone();
        tokio::spawn(async move {
            let _ = shutdown.recv().await;
            shutdown_handle.graceful_shutdown(Some(grace));
        });
        handle
    }
}

/// Connection-level limits for inbound clients.
fn apply_timeouts(builder: &mut auto::Builder<TokioExecutor>, config: &ListenerConfig) {
    builder
        .http1()
        .timer(TokioTimer::new())
        .header_read_timeout(config.header_read_timeout());
    builder
        .http2()
        .timer(TokioTimer::new())
        .keep_alive_interval(Some(config.idle_timeout()))
        .keep_alive_timeout(PING_TIMEOUT);
}

fn build_client(config: &UpstreamConfig) -> Result<UpstreamClient, TlsError> {
    let mut http = HttpConnector::new();
    http.enforce_http(false);
    http.set_connect_timeout(Some(config.connect_timeout()));
    if config.keepalive_secs > 0 {
        http.set_keepalive(Some(Duration::from_secs(config.keepalive_secs)));
    }

    let connector = tls::upstream_connector(http, config.skip_tls_verify)?;
    Ok(Client::builder(TokioExecutor::new())
        .pool_timer(TokioTimer::new())
        .pool_max_idle_per_host(config.pool_max_idle_per_host)
        .pool_idle_timeout(Duration::from_secs(config.pool_idle_secs))
        .build(connector))
}

/// Main proxy handler.
async fn proxy_handler(
    State(state): State<AppState>,
    ConnectInfo(client): ConnectInfo<SocketAddr>,
    mut request: Request<Body>,
) -> Response {
    let mut context = ProxyRequestContext::from_request(&request, client);
    let method = request.method().to_string();

    tracing::debug!(
        request_id = %context.request_id(),
        method = %method,
        path = %context.path(),
        "Proxying request"
    );

    let (route, upstream_path) = match state.director.rewrite(&mut request, &state.routes) {
        Directive::Forward {
            route,
            upstream_path,
        } => (route, upstream_path),
        Directive::NotFound => {
            context.set_status(StatusCode::NOT_FOUND);
            metrics::record_request(&method, 404, context.started());
            return (StatusCode::NOT_FOUND, NOT_FOUND_BODY).into_response();
        }
    };
    context.set_route(&route, &upstream_path);

    let deadline = time::Instant::now() + state.response_header_timeout;
    let permit = match time::timeout_at(deadline, state.upstream_slots.clone().acquire_owned()).await {
        Ok(Ok(permit)) => permit,
        Ok(Err(_)) => return bad_gateway(&mut context, &method, "closed"),
        Err(_) => {
            tracing::warn!(
                request_id = %context.request_id(),
                route = %route.prefix,
                "No upstream slot freed before the deadline"
            );
            return bad_gateway(&mut context, &method, "saturated");
        }
    };

    let dispatch = state.client.request(request);
    let mut response = match time::timeout_at(deadline, dispatch).await {
        Ok(Ok(response)) => response,
        Ok(Err(e)) => {
            tracing::error!(
                request_id = %context.request_id(),
                route = %route.prefix,
                error = %e,
                "Upstream request failed"
            );
            return bad_gateway(&mut context, &method, "request");
        }
        Err(_) => {
            tracing::warn!(
                request_id = %context.request_id(),
                route = %route.prefix,
                timeout = ?state.response_header_timeout,
                "Upstream response headers timed out"
            );
            return bad_gateway(&mut context, &method, "timeout");
        }
    };

    let status = response.status();
    context.set_status(status);
    state.shaper.shape(&mut response, &context);
    metrics::record_request(&method, status.as_u16(), context.started());

    let (parts, upstream) = response.into_parts();
    let body = pooled_body(
        upstream,
        &state.buffers,
        state.traffic.clone(),
        Some(permit),
        context,
        state.stream_limits,
    );
    Response::from_parts(parts, body)
}

fn bad_gateway(context: &mut ProxyRequestContext, method: &str, kind: &'static str) -> Response {
    context.set_status(StatusCode::BAD_GATEWAY);
    metrics::record_upstream_error(kind);
    metrics::record_request(method, 502, context.started());
    StatusCode::BAD_GATEWAY.into_response()
}
