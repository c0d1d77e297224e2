//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Build the shared application state from the validated config
//! - Create the Axum router: operational routes plus the dispatch fallback
//! - Wire up middleware (request ID, tracing, traffic log, CORS/compression,
//!   access control, timeout)
//! - Serve on the bound listener until shutdown

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{Request, State},
    http::HeaderName,
    middleware,
    response::{IntoResponse, Response},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::admin::{admin_router, GatewayInfo};
use crate::config::GatewayConfig;
use crate::dispatch::{Dispatcher, RemoteFallback};
use crate::handlers::HandlerContext;
use crate::http::pipeline::{response_pipeline, ResponsePipeline};
use crate::http::request::InboundRequest;
use crate::lifecycle::shutdown;
use crate::net::ServerBinding;
use crate::observability::traffic::{record_traffic, TrafficLog};
use crate::resilience::timeouts::EgressTimeouts;
use crate::routing::Registry;
use crate::secrets::{EnvStore, SecretProbe};
use crate::security::access_control::access_control_middleware;
use crate::security::{AccessPolicy, SsrfGuard};

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Application state injected into handlers and middleware.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub traffic: TrafficLog,
    pub env: EnvStore,
    pub probe: Arc<SecretProbe>,
    pub access: AccessPolicy,
    pub pipeline: Arc<ResponsePipeline>,
    pub info: Arc<GatewayInfo>,
    pub max_body_bytes: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// HTTP server for the local gateway.
pub struct HttpServer {
    router: Router,
    state: AppState,
}

impl HttpServer {
    /// Build a server whose routes come from `config.handlers`.
    pub fn new(config: &GatewayConfig, binding: ServerBinding) -> Result<Self, ServerError> {
        Self::with_registry(config, binding, Registry::from_config(&config.handlers))
    }

    /// Build a server with the environment store seeded from the process.
    pub fn with_registry(
        config: &GatewayConfig,
        binding: ServerBinding,
        registry: Registry,
    ) -> Result<Self, ServerError> {
        Self::with_parts(config, binding, registry, EnvStore::from_process_env())
    }

    pub fn with_parts(
        config: &GatewayConfig,
        binding: ServerBinding,
        registry: Registry,
        env: EnvStore,
    ) -> Result<Self, ServerError> {
        let timeouts = EgressTimeouts::from(&config.timeouts);
        let access = AccessPolicy::new(config.access.token.clone());

        let remote = if config.remote.fallback_enabled {
            Some(RemoteFallback::new(
                config.remote.base_url.clone(),
                timeouts.fallback_client()?,
                access.clone(),
            ))
        } else {
            None
        };

        let ctx = HandlerContext {
            client: timeouts.egress_client()?,
            env: env.clone(),
            ssrf: Arc::new(SsrfGuard::new(&config.ssrf)),
            timeouts,
            max_feed_bytes: config.limits.max_feed_bytes,
        };

        let info = GatewayInfo::new(
            config.mode.as_str(),
            binding,
            &config.remote.base_url,
            config.remote.fallback_enabled,
            &registry,
        );

        let state = AppState {
            dispatcher: Arc::new(Dispatcher::new(registry.routes(), remote, ctx)),
            traffic: TrafficLog::new(config.traffic.capacity),
            env,
            probe: Arc::new(SecretProbe::new(timeouts.probe_client()?, config.probe.endpoints.clone())),
            access,
            pipeline: Arc::new(ResponsePipeline::new(&config.cors, &config.compression)),
            info: Arc::new(info),
            max_body_bytes: config.limits.max_body_bytes,
        };

        let router = Self::build_router(config, state.clone());
        Ok(Self { router, state })
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// Layers run outermost-last: request ID → trace → traffic log →
    /// CORS/compression → access control → timeout → route.
    #[allow(deprecated)]
    fn build_router(config: &GatewayConfig, state: AppState) -> Router {
        let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

        admin_router()
            .fallback(dispatch_handler)
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(middleware::from_fn_with_state(state.clone(), access_control_middleware))
            .layer(middleware::from_fn_with_state(state.clone(), response_pipeline))
            .layer(middleware::from_fn_with_state(state.clone(), record_traffic))
            .layer(PropagateRequestIdLayer::new(request_id.clone()))
            .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("unknown");
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    path = %request.uri().path(),
                    request_id = %request_id,
                )
            }))
            .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
            .with_state(state)
    }

    /// The fully layered router, for in-process use (`tower::ServiceExt::oneshot`).
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Serve until `shutdown` fires, then drain in-flight requests.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown_rx: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            routes = self.state.dispatcher.routes().len(),
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown::wait(shutdown_rx))
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Everything not claimed by an operational route.
async fn dispatch_handler(State(state): State<AppState>, request: Request) -> Response {
    let inbound = match InboundRequest::materialize(request, state.max_body_bytes).await {
        Ok(inbound) => inbound,
        Err(e) => return e.into_response(),
    };
    state.dispatcher.dispatch(&inbound).await.into_response()
}
