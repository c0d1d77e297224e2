//! Local-first dispatch with remote fallback.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures_util::FutureExt;

use crate::dispatch::remote::RemoteFallback;
use crate::dispatch::DispatchOutcome;
use crate::handlers::HandlerContext;
use crate::http::request::InboundRequest;
use crate::observability::metrics;
use crate::routing::{has_dot_segment, RouteTable};

pub struct Dispatcher {
    routes: Arc<RouteTable>,
    remote: Option<RemoteFallback>,
    ctx: HandlerContext,
}

impl Dispatcher {
    /// `remote` is `None` when fallback is disabled.
    pub fn new(routes: Arc<RouteTable>, remote: Option<RemoteFallback>, ctx: HandlerContext) -> Self {
        Self {
            routes,
            remote,
            ctx,
        }
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    pub fn remote(&self) -> Option<&RemoteFallback> {
        self.remote.as_ref()
    }

    pub fn context(&self) -> &HandlerContext {
        &self.ctx
    }

    pub async fn dispatch(&self, inbound: &InboundRequest) -> DispatchOutcome {
        let start = Instant::now();
        let outcome = self.route(inbound).await;
        metrics::record_dispatch(outcome.label(), start);
        tracing::debug!(
            method = %inbound.method,
            path = %inbound.path,
            outcome = outcome.label(),
            "Request dispatched"
        );
        outcome
    }

    async fn route(&self, inbound: &InboundRequest) -> DispatchOutcome {
        if !inbound.path.starts_with("/api/") || has_dot_segment(&inbound.path) {
            return DispatchOutcome::NotFound;
        }

        let Some(matched) = self.routes.lookup(&inbound.path) else {
            return self.forward_unrouted(inbound).await;
        };

        let handler = matched.route.handler().clone();
        let local = inbound.to_local(matched.params);
        let response = match AssertUnwindSafe(handler.call(local, &self.ctx))
            .catch_unwind()
            .await
        {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                tracing::warn!(path = %inbound.path, error = %e, "Local handler failed");
                return DispatchOutcome::HandlerFault(e.to_string());
            }
            Err(_) => {
                tracing::error!(path = %inbound.path, "Local handler panicked");
                return DispatchOutcome::HandlerFault("handler panicked".to_string());
            }
        };

        if !response.status().is_server_error() {
            return DispatchOutcome::ServedLocal(response);
        }
        let Some(remote) = &self.remote else {
            return DispatchOutcome::ServedLocal(response);
        };

        tracing::info!(
            path = %inbound.path,
            status = response.status().as_u16(),
            "Local handler returned server error, trying remote"
        );
        match remote.forward(inbound).await {
            Ok(remote_response) => DispatchOutcome::FellBackToRemote(remote_response),
            Err(e) => {
                tracing::warn!(path = %inbound.path, reason = e.reason(), "Remote fallback failed, keeping local response");
                DispatchOutcome::ServedLocal(response)
            }
        }
    }

    async fn forward_unrouted(&self, inbound: &InboundRequest) -> DispatchOutcome {
        let Some(remote) = &self.remote else {
            return DispatchOutcome::NotFound;
        };
        match remote.forward(inbound).await {
            Ok(response) => DispatchOutcome::RemoteOnly(response),
            Err(e) => {
                tracing::warn!(path = %inbound.path, reason = e.reason(), "Remote fallback unavailable");
                DispatchOutcome::RemoteUnavailable(e.reason().to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use axum::{
        http::{HeaderMap, Method, StatusCode},
        response::Response,
    };
    use bytes::Bytes;

    use crate::config::SsrfConfig;
    use crate::handlers::static_json::StaticHandler;
    use crate::handlers::{Handler, HandlerError, LocalRequest};
    use crate::resilience::timeouts::EgressTimeouts;
    use crate::routing::RoutePattern;
    use crate::secrets::EnvStore;
    use crate::security::SsrfGuard;

    #[derive(Debug)]
    struct Panicking;

    #[async_trait]
    impl Handler for Panicking {
        async fn call(&self, _req: LocalRequest, _ctx: &HandlerContext) -> Result<Response, HandlerError> {
            panic!("boom");
        }
    }

    #[derive(Debug)]
    struct Failing;

    #[async_trait]
    impl Handler for Failing {
        async fn call(&self, _req: LocalRequest, _ctx: &HandlerContext) -> Result<Response, HandlerError> {
            Err(HandlerError::Internal("no upstream".into()))
        }
    }

    fn context() -> HandlerContext {
        HandlerContext {
            client: reqwest::Client::new(),
            env: EnvStore::new(),
            ssrf: Arc::new(SsrfGuard::new(&SsrfConfig::default())),
            timeouts: EgressTimeouts::default(),
            max_feed_bytes: 1024,
        }
    }

    fn h(handler: impl Handler + 'static) -> Arc<dyn Handler> {
        Arc::new(handler)
    }

    fn dispatcher(routes: &[(&str, Arc<dyn Handler>)]) -> Dispatcher {
        let mut builder = RouteTable::builder();
        for (pattern, handler) in routes {
            builder
                .insert(RoutePattern::parse(pattern).unwrap(), handler.clone(), None)
                .unwrap();
        }
        Dispatcher::new(Arc::new(builder.build()), None, context())
    }

    fn get(path: &str) -> InboundRequest {
        InboundRequest {
            method: Method::GET,
            path: path.to_string(),
            query: None,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    #[tokio::test]
    async fn outside_api_is_not_found() {
        let d = dispatcher(&[("/api/markets", h(StaticHandler::json("{}")))]);
        assert!(matches!(d.dispatch(&get("/markets")).await, DispatchOutcome::NotFound));
        assert!(matches!(d.dispatch(&get("/api/other")).await, DispatchOutcome::NotFound));
    }

    #[tokio::test]
    async fn dot_segments_are_not_found_even_with_fallback() {
        let remote = RemoteFallback::new(
            "http://127.0.0.1:9",
            reqwest::Client::new(),
            crate::security::AccessPolicy::default(),
        );
        let d = Dispatcher::new(Arc::new(RouteTable::builder().build()), Some(remote), context());
        for path in ["/api/../admin/secret", "/api/%2e%2e/internal", "/api/./x/../../etc"] {
            assert!(matches!(d.dispatch(&get(path)).await, DispatchOutcome::NotFound), "{path}");
        }
    }

    #[tokio::test]
    async fn server_error_without_fallback_is_served_locally() {
        let handler = StaticHandler::json("{\"error\":\"down\"}").with_status(StatusCode::SERVICE_UNAVAILABLE);
        let d = dispatcher(&[("/api/markets", h(handler))]);
        match d.dispatch(&get("/api/markets/")).await {
            DispatchOutcome::ServedLocal(response) => {
                assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE)
            }
            other => panic!("unexpected outcome {}", other.label()),
        }
    }

    #[tokio::test]
    async fn handler_errors_and_panics_are_faults() {
        let d = dispatcher(&[
            ("/api/fail", h(Failing)),
            ("/api/panic", h(Panicking)),
        ]);
        match d.dispatch(&get("/api/fail")).await {
            DispatchOutcome::HandlerFault(reason) => assert_eq!(reason, "no upstream"),
            other => panic!("unexpected outcome {}", other.label()),
        }
        match d.dispatch(&get("/api/panic")).await {
            DispatchOutcome::HandlerFault(reason) => assert_eq!(reason, "handler panicked"),
            other => panic!("unexpected outcome {}", other.label()),
        }
    }

    #[tokio::test]
    async fn params_reach_handler() {
        #[derive(Debug)]
        struct Echo;

        #[async_trait]
        impl Handler for Echo {
            async fn call(&self, req: LocalRequest, _ctx: &HandlerContext) -> Result<Response, HandlerError> {
                let id = req.param("id").unwrap_or_default().to_string();
                Ok(Response::new(id.into()))
            }
        }

        let d = dispatcher(&[("/api/items/[id]", h(Echo))]);
        let DispatchOutcome::ServedLocal(response) = d.dispatch(&get("/api/items/42")).await else {
            panic!("expected local response");
        };
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"42");
    }
}
