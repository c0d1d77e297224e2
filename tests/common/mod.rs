//! Shared utilities for integration and load testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::Body,
    extract::Request,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Router,
};
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use local_api_gateway::config::GatewayConfig;
use local_api_gateway::handlers::{Handler, HandlerContext, HandlerError, LocalRequest};
use local_api_gateway::http::HttpServer;
use local_api_gateway::lifecycle::Shutdown;
use local_api_gateway::net::{Listener, ServerBinding};
use local_api_gateway::routing::Registry;
use local_api_gateway::secrets::EnvStore;

/// A request as seen by the mock backend.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub path_and_query: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

type Responder = Arc<dyn Fn(&Recorded) -> Response + Send + Sync>;

/// Recording HTTP backend standing in for the hosted deployment or a provider.
pub struct MockBackend {
    pub addr: SocketAddr,
    hits: Arc<Mutex<Vec<Recorded>>>,
    task: JoinHandle<()>,
}

impl MockBackend {
    /// Start a backend answering every request with `responder`.
    pub async fn start<F>(responder: F) -> Self
    where
        F: Fn(&Recorded) -> Response + Send + Sync + 'static,
    {
        let responder: Responder = Arc::new(responder);
        let hits: Arc<Mutex<Vec<Recorded>>> = Arc::new(Mutex::new(Vec::new()));

        let app = {
            let hits = hits.clone();
            Router::new().fallback(move |request: Request| {
                let hits = hits.clone();
                let responder = responder.clone();
                async move {
                    let (parts, body) = request.into_parts();
                    let body = axum::body::to_bytes(body, usize::MAX)
                        .await
                        .unwrap_or_default();
                    let recorded = Recorded {
                        method: parts.method.to_string(),
                        path_and_query: parts
                            .uri
                            .path_and_query()
                            .map(|pq| pq.as_str().to_string())
                            .unwrap_or_else(|| "/".into()),
                        headers: parts.headers,
                        body,
                    };
                    let response = responder(&recorded);
                    hits.lock().push(recorded);
                    response
                }
            })
        };

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let task = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self { addr, hits, task }
    }

    /// Backend that always answers `status` with a JSON body.
    pub async fn json(status: StatusCode, body: &'static str) -> Self {
        Self::start(move |_| {
            (
                status,
                [("content-type", "application/json")],
                body,
            )
                .into_response()
        })
        .await
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn hit_count(&self) -> usize {
        self.hits.lock().len()
    }

    pub fn hits(&self) -> Vec<Recorded> {
        self.hits.lock().clone()
    }
}

impl Drop for MockBackend {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// An address nothing listens on.
pub async fn dead_address() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// Config bound to an ephemeral loopback port, fallback pointed at `remote`.
pub fn test_config(remote: Option<String>) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.listener.port = 0;
    config.timeouts.connect_secs = 2;
    config.timeouts.fallback_secs = 5;
    config.timeouts.probe_secs = 5;
    match remote {
        Some(base) => config.remote.base_url = base,
        None => config.remote.fallback_enabled = false,
    }
    config
}

/// A gateway serving on loopback for the duration of a test.
pub struct TestGateway {
    pub addr: SocketAddr,
    pub binding: ServerBinding,
    pub env: EnvStore,
    shutdown: Shutdown,
    task: JoinHandle<Result<(), std::io::Error>>,
}

impl TestGateway {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn stop(self) {
        self.shutdown.trigger();
        let _ = tokio::time::timeout(std::time::Duration::from_secs(5), self.task).await;
    }
}

pub async fn spawn_gateway(config: GatewayConfig, registry: Registry) -> TestGateway {
    spawn_gateway_with_env(config, registry, EnvStore::new()).await
}

pub async fn spawn_gateway_with_env(
    config: GatewayConfig,
    registry: Registry,
    env: EnvStore,
) -> TestGateway {
    let listener = Listener::bind(&config.listener).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (listener, binding) = listener.into_parts();

    let server = HttpServer::with_parts(&config, binding.clone(), registry, env.clone()).unwrap();
    let shutdown = Shutdown::new();
    let task = tokio::spawn(server.run(listener, shutdown.subscribe()));

    TestGateway {
        addr,
        binding,
        env,
        shutdown,
        task,
    }
}

/// Client that never goes through a system proxy and never decompresses.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

/// Handler answering with a fixed status and body.
#[derive(Debug)]
pub struct Fixed {
    pub status: StatusCode,
    pub body: String,
}

impl Fixed {
    pub fn new(status: StatusCode, body: impl Into<String>) -> Arc<dyn Handler> {
        Arc::new(Self {
            status,
            body: body.into(),
        })
    }
}

#[async_trait]
impl Handler for Fixed {
    async fn call(&self, _req: LocalRequest, _ctx: &HandlerContext) -> Result<Response, HandlerError> {
        Response::builder()
            .status(self.status)
            .header("content-type", "application/json")
            .body(Body::from(self.body.clone()))
            .map_err(|e| HandlerError::Internal(e.to_string()))
    }
}

/// Handler that reads its egress body and then tries to send it anyway.
#[derive(Debug)]
pub struct DoubleConsume {
    pub target: String,
}

#[async_trait]
impl Handler for DoubleConsume {
    async fn call(&self, req: LocalRequest, ctx: &HandlerContext) -> Result<Response, HandlerError> {
        let mut outbound = req.outbound(axum::http::Method::POST, self.target.clone());
        let _inspected = outbound.text()?;
        let response = outbound
            .into_request(&ctx.client)?
            .send()
            .await
            .map_err(|e| HandlerError::Internal(e.to_string()))?;
        Ok(StatusCode::from_u16(response.status().as_u16())
            .unwrap_or(StatusCode::BAD_GATEWAY)
            .into_response())
    }
}

/// Handler that drains and rewrites its own copy of the body, then fails.
#[derive(Debug)]
pub struct TransformThenFail;

#[async_trait]
impl Handler for TransformThenFail {
    async fn call(&self, req: LocalRequest, _ctx: &HandlerContext) -> Result<Response, HandlerError> {
        let mut outbound = req.outbound(axum::http::Method::POST, "https://upstream.invalid/v1");
        let transformed = outbound.text()?.to_uppercase();
        Ok((
            StatusCode::SERVICE_UNAVAILABLE,
            [("content-type", "application/json")],
            format!(r#"{{"error":"upstream down","saw":{}}}"#, transformed.len()),
        )
            .into_response())
    }
}

/// Send a GET for `target` over a raw socket, bypassing client-side URL
/// normalization, and return the status line.
pub async fn raw_request(addr: SocketAddr, target: &str) -> String {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let mut socket = tokio::net::TcpStream::connect(addr).await.unwrap();
    let request = format!("GET {target} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n");
    socket.write_all(request.as_bytes()).await.unwrap();

    let mut response = Vec::new();
    socket.read_to_end(&mut response).await.unwrap();
    String::from_utf8_lossy(&response)
        .lines()
        .next()
        .unwrap_or_default()
        .to_string()
}
