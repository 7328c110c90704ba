//! Media relay (v1)
//!
//! # Architecture Overview
//!
//! ```text
//!                 ┌──────────────────────────────────────────────────────────┐
//!                 │                       MEDIA RELAY                        │
//!                 │                                                          │
//!  Client Request │  ┌──────────┐    ┌──────────┐    ┌──────────────┐        │
//!  ───────────────┼─▶│   TLS    │───▶│  http    │───▶│   director   │        │
//!                 │  │ listener │    │  server  │    │ (route table)│        │
//!                 │  └──────────┘    └──────────┘    └──────┬───────┘        │
//!                 │                                         │ 404 if no route│
//!                 │                                         ▼                │
//! Client Response │  ┌──────────┐    ┌──────────┐    ┌──────────────┐        │
//!  ◀──────────────┼──│  pooled  │◀───│ response │◀───│   upstream   │◀───────┼─── Origin
//!                 │  │   body   │    │  shaper  │    │ HTTPS client │        │
//!                 │  └──────────┘    └──────────┘    └──────────────┘        │
//!                 │                                                          │
//!                 │  background: route reloader · telemetry · metrics        │
//!                 └──────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use media_relay::lifecycle::startup::{self, StartupOptions};
use media_relay::net::tls;
use media_relay::observability::logging;

#[derive(Parser)]
#[command(name = "media-relay")]
#[command(about = "TLS-terminating reverse proxy for media origins", long_about = None)]
struct Cli {
    /// TOML configuration file; built-in defaults when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Route file, overriding `routes.path` from the configuration.
    #[arg(short, long)]
    routes: Option<PathBuf>,

    /// Load the configuration and route file, report, and exit.
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    tls::install_crypto_provider();

    let options = StartupOptions {
        config_path: cli.config,
        routes_path: cli.routes,
    };
    let config = startup::load_configuration(&options)?;

    if cli.check {
        let report = startup::check(&config)?;
        println!("configuration OK");
        println!("  origin: {}", report.origin);
        println!("  routes: {} from {}", report.routes, report.routes_path);
        println!("  tls:    {}", if report.tls { "enabled" } else { "disabled" });
        return Ok(());
    }

    logging::init_logging(&config.observability)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "media-relay starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        origin = %config.upstream.origin,
        routes = %config.routes.path,
        "Configuration loaded"
    );

    startup::run(config).await?;
    Ok(())
}
