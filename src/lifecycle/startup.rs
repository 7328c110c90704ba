//! Startup orchestration.
//!
//! # Responsibilities
//! - Load configuration, apply command-line overrides
//! - Load the route table (fatal on failure)
//! - Start background tasks (route reloader, file watcher, telemetry, metrics)
//! - Bind the listener, plain or TLS, and serve until a shutdown signal
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Listeners start last (traffic only when routes are loaded)

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use metrics_exporter_prometheus::BuildError;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use crate::config::watcher::RouteWatcher;
use crate::config::{load_config, ConfigError, ProxyConfig};
use crate::http::{Director, DirectorError, HttpServer, ServerError};
use crate::lifecycle::{signals, Shutdown};
use crate::net::tls::{self, TlsError};
use crate::observability::{metrics, TelemetryReporter};
use crate::routing::{RouteError, RouteReloader, RouteSource, RouteTable};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("route table error: {0}")]
    Routes(#[from] RouteError),

    #[error("upstream error: {0}")]
    Upstream(#[from] DirectorError),

    #[error("server error: {0}")]
    Server(#[from] ServerError),

    #[error("TLS error: {0}")]
    Tls(#[from] TlsError),

    #[error("metrics exporter error: {0}")]
    Metrics(#[from] BuildError),

    #[error("invalid {field} '{value}'")]
    Address { field: &'static str, value: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Where configuration comes from.
#[derive(Debug, Clone, Default)]
pub struct StartupOptions {
    /// TOML configuration file; built-in defaults when absent.
    pub config_path: Option<PathBuf>,
    /// Replaces `routes.path` from the configuration.
    pub routes_path: Option<PathBuf>,
}

/// Outcome of a `--check` run.
#[derive(Debug, Clone)]
pub struct CheckReport {
    pub origin: String,
    pub routes_path: String,
    pub routes: usize,
    pub tls: bool,
}

pub fn load_configuration(options: &StartupOptions) -> Result<ProxyConfig, ConfigError> {
    let mut config = match &options.config_path {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };
    if let Some(routes) = &options.routes_path {
        config.routes.path = routes.to_string_lossy().into_owned();
    }
    Ok(config)
}

/// Validate everything startup would touch without binding anything.
pub fn check(config: &ProxyConfig) -> Result<CheckReport, StartupError> {
    let director = Director::new(&config.upstream)?;
    let routes = RouteTable::load(&RouteSource::new(&config.routes.path))?;
    parse_addr("listener.bind_address", &config.listener.bind_address)?;

    if let Some(tls) = &config.listener.tls {
        for (kind, path) in [("Certificate", &tls.cert_path), ("Private key", &tls.key_path)] {
            if !Path::new(path).exists() {
                return Err(TlsError::Missing {
                    kind,
                    path: PathBuf::from(path),
                }
                .into());
            }
        }
    }

    Ok(CheckReport {
        origin: director.origin(),
        routes_path: config.routes.path.clone(),
        routes: routes.len(),
        tls: config.listener.tls.is_some(),
    })
}

/// Run the relay until Ctrl-C or SIGTERM.
pub async fn run(config: ProxyConfig) -> Result<(), StartupError> {
    let source = RouteSource::new(&config.routes.path);
    let routes = Arc::new(RouteTable::load(&source)?);
    tracing::info!(
        path = %config.routes.path,
        routes = routes.len(),
        "Route table loaded"
    );

    if config.observability.metrics_enabled {
        let addr = parse_addr("observability.metrics_address", &config.observability.metrics_address)?;
        metrics::init_metrics(addr)?;
    }

    let server = HttpServer::new(config.clone(), routes.clone())?;
    let shutdown = Shutdown::new();

    let (nudge_tx, nudge_rx) = mpsc::channel(1);
    let reloader = RouteReloader::new(routes.clone(), source, config.routes.reload_interval())
        .with_nudges(nudge_rx);
    tokio::spawn(reloader.run(shutdown.subscribe()));

    // Dropping the watcher stops it, so it lives until `run` returns.
    let _watcher = if config.routes.watch {
        match RouteWatcher::new(Path::new(&config.routes.path), nudge_tx.clone()).run() {
            Ok(watcher) => Some(watcher),
            Err(e) => {
                tracing::warn!(error = %e, "Route file watcher unavailable, polling only");
                None
            }
        }
    } else {
        None
    };
    signals::spawn_hangup_reload(nudge_tx, shutdown.subscribe());

    if config.observability.telemetry_interval_secs > 0 {
        let state = server.state();
        let reporter = TelemetryReporter::new(
            state.buffers.clone(),
            state.traffic.clone(),
            routes.clone(),
            Duration::from_secs(config.observability.telemetry_interval_secs),
        );
        tokio::spawn(reporter.run(shutdown.subscribe()));
    }

    let trigger = shutdown.clone();
    tokio::spawn(async move {
        signals::shutdown_signal().await;
        trigger.trigger();
    });

    let addr = parse_addr("listener.bind_address", &config.listener.bind_address)?;
    match &config.listener.tls {
        Some(tls_config) => {
            let rustls = tls::load_server_config(
                Path::new(&tls_config.cert_path),
                Path::new(&tls_config.key_path),
            )
            .await?;
            server.run_tls(addr, rustls, shutdown.subscribe()).await?;
        }
        None => {
            tracing::warn!("No TLS configured, serving plain HTTP");
            let listener = TcpListener::bind(addr).await?;
            server.run(listener, shutdown.subscribe()).await?;
        }
    }

    shutdown.trigger();
    tracing::info!("Shutdown complete");
    Ok(())
}

fn parse_addr(field: &'static str, value: &str) -> Result<SocketAddr, StartupError> {
    value.parse().map_err(|_| StartupError::Address {
        field,
        value: value.to_string(),
    })
}
