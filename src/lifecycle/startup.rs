//! Startup orchestration.
//!
//! # Responsibilities
//! - Bind the listener (recovering from a port conflict)
//! - Load the handler registry and assemble the HTTP server
//! - Spawn the serve loop tied to the shutdown coordinator
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Listener binds before the server is built so the status route knows the real port
//! - Logging and metrics are installed by the binary, not here, so tests can start
//!   several gateways in one process

use std::net::SocketAddr;

use tokio::task::JoinHandle;

use crate::config::GatewayConfig;
use crate::http::server::{HttpServer, ServerError};
use crate::net::{Listener, ListenerError, ServerBinding};
use crate::routing::Registry;

use super::Shutdown;

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Listener(#[from] ListenerError),

    #[error(transparent)]
    Server(#[from] ServerError),

    #[error("Failed to read bound address: {0}")]
    Io(#[from] std::io::Error),
}

/// A gateway serving in the background.
#[derive(Debug)]
pub struct RunningGateway {
    pub binding: ServerBinding,
    pub local_addr: SocketAddr,
    pub task: JoinHandle<Result<(), std::io::Error>>,
}

/// Start with the registry described by `config.handlers`.
pub async fn start(config: &GatewayConfig, shutdown: &Shutdown) -> Result<RunningGateway, StartupError> {
    start_with_registry(config, Registry::from_config(&config.handlers), shutdown).await
}

pub async fn start_with_registry(
    config: &GatewayConfig,
    registry: Registry,
    shutdown: &Shutdown,
) -> Result<RunningGateway, StartupError> {
    let listener = Listener::bind(&config.listener).await?;
    let local_addr = listener.local_addr()?;
    let (listener, binding) = listener.into_parts();

    let server = HttpServer::with_registry(config, binding.clone(), registry)?;
    let task = tokio::spawn(server.run(listener, shutdown.subscribe()));

    tracing::info!(
        address = %local_addr,
        mode = config.mode.as_str(),
        "Gateway started"
    );

    Ok(RunningGateway {
        binding,
        local_addr,
        task,
    })
}
