//! Local handler plug-ins.
//!
//! # Data Flow
//! ```text
//! descriptor (*.toml: kind + options)
//!     → catalog.rs (kind → factory)
//!     → Arc<dyn Handler>
//!     → routing::registry (bound to a pattern)
//!
//! per request:
//!     InboundRequest → LocalRequest (Origin removed, params attached)
//!     → Handler::call(req, &HandlerContext)
//!     → Response | HandlerError
//! ```
//!
//! # Design Decisions
//! - Handlers get a view of the buffered body; they cannot starve the fallback
//! - Egress bodies are single-use only where a handler opts in (`OutboundRequest`)
//! - Shared services reach handlers through `HandlerContext`, never globals

pub mod catalog;
pub mod feed;
pub mod static_json;
pub mod upstream;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    http::{HeaderMap, HeaderName, HeaderValue, Method},
    response::Response,
};
use bytes::Bytes;

use crate::resilience::timeouts::EgressTimeouts;
use crate::secrets::EnvStore;
use crate::security::ssrf::SsrfGuard;

pub use catalog::{Catalog, HandlerFactory};

/// A local route implementation.
#[async_trait]
pub trait Handler: Send + Sync + std::fmt::Debug {
    async fn call(&self, req: LocalRequest, ctx: &HandlerContext) -> Result<Response, HandlerError>;
}

/// Failure inside a handler. Always surfaces as a handler fault, never
/// as a remote fallback.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error("request body already consumed")]
    BodyConsumed,

    #[error("invalid outbound request: {0}")]
    InvalidRequest(String),

    #[error("{0}")]
    Internal(String),
}

/// What a handler sees of the inbound request.
#[derive(Debug, Clone)]
pub struct LocalRequest {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub params: HashMap<String, String>,
}

impl LocalRequest {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// First value of a decoded query parameter.
    pub fn query_param(&self, name: &str) -> Option<String> {
        let query = self.query.as_deref()?;
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    }

    /// Start an egress request carrying this request's body.
    pub fn outbound(&self, method: Method, url: impl Into<String>) -> OutboundRequest {
        OutboundRequest::new(method, url, self.body.clone())
    }
}

/// Handler-side egress request with a single-use body.
///
/// Reading the body through [`OutboundRequest::bytes`] or
/// [`OutboundRequest::text`] drains it; sending a drained request fails with
/// [`HandlerError::BodyConsumed`].
#[derive(Debug)]
pub struct OutboundRequest {
    method: Method,
    url: String,
    headers: HeaderMap,
    body: Option<Bytes>,
}

impl OutboundRequest {
    pub fn new(method: Method, url: impl Into<String>, body: Bytes) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            body: Some(body),
        }
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn is_consumed(&self) -> bool {
        self.body.is_none()
    }

    pub fn bytes(&mut self) -> Result<Bytes, HandlerError> {
        self.body.take().ok_or(HandlerError::BodyConsumed)
    }

    pub fn text(&mut self) -> Result<String, HandlerError> {
        let bytes = self.bytes()?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| HandlerError::InvalidRequest("body is not valid UTF-8".into()))
    }

    /// Turn this request into a network call.
    pub fn into_request(self, client: &reqwest::Client) -> Result<reqwest::RequestBuilder, HandlerError> {
        let body = self.body.ok_or(HandlerError::BodyConsumed)?;
        let url = reqwest::Url::parse(&self.url)
            .map_err(|e| HandlerError::InvalidRequest(e.to_string()))?;
        let mut builder = client.request(self.method, url).headers(self.headers);
        if !body.is_empty() {
            builder = builder.body(body);
        }
        Ok(builder)
    }
}

/// Services available to every handler.
#[derive(Debug, Clone)]
pub struct HandlerContext {
    /// Shared egress client for upstream calls.
    pub client: reqwest::Client,

    /// Allowlisted runtime settings.
    pub env: EnvStore,

    /// Guard for client-supplied URLs.
    pub ssrf: Arc<SsrfGuard>,

    /// Egress timeouts, for handlers that build their own clients.
    pub timeouts: EgressTimeouts,

    /// Cap on feed response bodies.
    pub max_feed_bytes: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outbound_body_is_single_use() {
        let client = reqwest::Client::new();
        let mut outbound = OutboundRequest::new(
            Method::POST,
            "https://api.example.com/v1/items",
            Bytes::from_static(b"{\"q\":1}"),
        );
        assert_eq!(outbound.text().unwrap(), "{\"q\":1}");
        assert!(outbound.is_consumed());
        assert!(matches!(outbound.bytes(), Err(HandlerError::BodyConsumed)));
        assert!(matches!(
            outbound.into_request(&client),
            Err(HandlerError::BodyConsumed)
        ));
    }

    #[test]
    fn untouched_outbound_builds() {
        let client = reqwest::Client::new();
        let outbound = OutboundRequest::new(Method::GET, "https://api.example.com/", Bytes::new());
        assert!(outbound.into_request(&client).is_ok());
    }

    #[test]
    fn query_param_decodes() {
        let req = LocalRequest {
            method: Method::GET,
            path: "/api/rss-proxy".into(),
            query: Some("url=https%3A%2F%2Ffeeds.example.com%2Frss&x=1".into()),
            headers: HeaderMap::new(),
            body: Bytes::new(),
            params: HashMap::new(),
        };
        assert_eq!(
            req.query_param("url").as_deref(),
            Some("https://feeds.example.com/rss")
        );
        assert!(req.query_param("missing").is_none());
    }
}
