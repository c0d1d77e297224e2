//! Local API gateway (desktop sidecar)
//!
//! Serves the application's `/api/*` surface on loopback, running local
//! handlers first and falling back to the hosted deployment.
//!
//! # Architecture Overview
//!
//! ```text
//!                  ┌───────────────────────────────────────────────────────────┐
//!                  │                     LOCAL API GATEWAY                      │
//!                  │                                                            │
//!  Desktop UI      │  ┌──────────┐   ┌────────────┐   ┌──────────────────┐      │
//!  ────────────────┼─▶│   net    │──▶│   http     │──▶│  access control  │      │
//!                  │  │ listener │   │ pipeline   │   │  (bearer token)  │      │
//!                  │  └──────────┘   └────────────┘   └────────┬─────────┘      │
//!                  │                                          │                 │
//!                  │                  ┌───────────────────────┴──────┐          │
//!                  │                  ▼                              ▼          │
//!                  │          ┌──────────────┐              ┌──────────────┐    │
//!                  │          │    admin     │              │   dispatch   │    │
//!                  │          │ status, env, │              │ route lookup │    │
//!                  │          │ traffic, key │              └──────┬───────┘    │
//!                  │          └──────────────┘                     │            │
//!                  │                                   ┌───────────┴─────────┐  │
//!                  │                                   ▼                     ▼  │
//!                  │                           ┌──────────────┐     ┌──────────┐│
//!                  │                           │   handlers   │────▶│  remote  ││──▶ hosted
//!                  │                           │ static/feed/ │ 5xx │ fallback ││    deployment
//!                  │                           │  upstream    │     └──────────┘│
//!                  │                           └──────────────┘                 │
//!                  └───────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use local_api_gateway::config::{self, GatewayConfig, RuntimeMode};
use local_api_gateway::lifecycle::{self, signals, Shutdown};
use local_api_gateway::observability::{logging, metrics};

#[derive(Parser, Debug)]
#[command(name = "local-api-gateway")]
#[command(about = "Local-first API gateway for the desktop app", long_about = None)]
struct Args {
    /// TOML configuration file.
    #[arg(short, long, env = "LOCAL_API_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on.
    #[arg(short, long)]
    port: Option<u16>,

    /// Directory holding handler descriptors.
    #[arg(long)]
    api_dir: Option<PathBuf>,

    /// Packaged resource root (descriptors under `_up_/api`).
    #[arg(long)]
    resource_dir: Option<PathBuf>,

    /// Base URL of the hosted deployment.
    #[arg(long)]
    remote_base: Option<String>,

    /// Disable remote fallback.
    #[arg(long)]
    no_fallback: bool,

    /// Runtime mode reported by the status route.
    #[arg(long)]
    mode: Option<String>,

    /// Emit JSON log lines.
    #[arg(long)]
    json_logs: bool,
}

impl Args {
    fn apply(self, config: &mut GatewayConfig) {
        if let Some(port) = self.port {
            config.listener.port = port;
        }
        if let Some(dir) = self.api_dir {
            config.handlers.api_dir = Some(dir);
        }
        if let Some(dir) = self.resource_dir {
            config.handlers.resource_dir = Some(dir);
        }
        if let Some(base) = self.remote_base {
            config.remote.base_url = base;
        }
        if self.no_fallback {
            config.remote.fallback_enabled = false;
        }
        if let Some(mode) = self.mode {
            config.mode = RuntimeMode::parse(&mode);
        }
        if self.json_logs {
            config.observability.json_logs = true;
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => config::read_config(path)?,
        None => GatewayConfig::default(),
    };
    config::apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;
    args.apply(&mut config);
    config::validate_config(&config).map_err(config::ConfigError::Validation)?;

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "local-api-gateway starting");
    tracing::info!(
        host = %config.listener.host,
        port = config.listener.port,
        mode = config.mode.as_str(),
        fallback = config.remote.fallback_enabled,
        auth = config.access.token.is_some(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let shutdown = Shutdown::new();
    let gateway = lifecycle::start(&config, &shutdown).await?;
    tracing::info!(
        description = %gateway.binding.description(),
        recovered = gateway.binding.recovered,
        "Gateway ready"
    );

    signals::wait_for_signal().await;
    shutdown.trigger();
    gateway.task.await??;

    tracing::info!("Shutdown complete");
    Ok(())
}
