//! TCP listener with port-conflict recovery.
//!
//! # Responsibilities
//! - Bind to the configured host and port
//! - On address-in-use, fall back to an OS-assigned port
//! - Report the binding actually obtained
//!
//! # Design Decisions
//! - Only `AddrInUse` is recovered; every other bind error is fatal
//! - The requested port is kept so the status route can show the divergence

use std::io::ErrorKind;
use std::net::{IpAddr, SocketAddr};

use serde::Serialize;
use tokio::net::TcpListener;

use crate::config::ListenerConfig;

/// Error type for listener operations.
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    #[error("Invalid listen host {0:?}")]
    Address(String),

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

/// Where the gateway ended up listening.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerBinding {
    pub host: String,
    pub requested_port: u16,
    pub port: u16,
    /// The requested port was taken and an OS-assigned one is used instead.
    pub recovered: bool,
}

impl ServerBinding {
    pub fn description(&self) -> String {
        format!("Running on {}:{}", self.host, self.port)
    }
}

pub struct Listener {
    inner: TcpListener,
    binding: ServerBinding,
}

impl Listener {
    pub async fn bind(config: &ListenerConfig) -> Result<Self, ListenerError> {
        let ip: IpAddr = config
            .host
            .parse()
            .map_err(|_| ListenerError::Address(config.host.clone()))?;
        let addr = SocketAddr::new(ip, config.port);

        let (inner, recovered) = match TcpListener::bind(addr).await {
            Ok(listener) => (listener, false),
            Err(e) if e.kind() == ErrorKind::AddrInUse && config.recover_on_conflict => {
                tracing::warn!(
                    address = %addr,
                    "Port in use, binding an OS-assigned port instead"
                );
                let fallback = SocketAddr::new(addr.ip(), 0);
                let listener = TcpListener::bind(fallback)
                    .await
                    .map_err(|source| ListenerError::Bind {
                        addr: fallback.to_string(),
                        source,
                    })?;
                (listener, true)
            }
            Err(source) => {
                return Err(ListenerError::Bind {
                    addr: addr.to_string(),
                    source,
                })
            }
        };

        let local_addr = inner.local_addr().map_err(|source| ListenerError::Bind {
            addr: addr.to_string(),
            source,
        })?;
        let binding = ServerBinding {
            host: config.host.clone(),
            requested_port: config.port,
            port: local_addr.port(),
            recovered,
        };

        tracing::info!(
            address = %local_addr,
            requested_port = config.port,
            recovered,
            "Listener bound"
        );

        Ok(Self { inner, binding })
    }

    pub fn binding(&self) -> &ServerBinding {
        &self.binding
    }

    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.inner.local_addr()
    }

    pub fn into_parts(self) -> (TcpListener, ServerBinding) {
        (self.inner, self.binding)
    }
}
