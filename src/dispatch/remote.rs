//! Remote fallback client.
//!
//! Replays a buffered inbound request against the hosted deployment and
//! copies its answer back. The local gateway token never leaves the machine.

use axum::{
    body::Body,
    http::{header, HeaderMap},
    response::Response,
};

use crate::http::request::InboundRequest;
use crate::http::response::strip_hop_by_hop;
use crate::resilience::timeouts::FailureClass;
use crate::security::AccessPolicy;

/// Transport-level failure talking to the remote base.
///
/// Display carries only the failure class; `reqwest::Error` would print the URL.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("remote request failed ({})", FailureClass::of(.0).as_str())]
    Transport(#[from] reqwest::Error),

    #[error("forwarded path leaves the remote API prefix")]
    OutsideApi,
}

impl RemoteError {
    pub fn reason(&self) -> &'static str {
        match self {
            RemoteError::Transport(e) => FailureClass::of(e).as_str(),
            RemoteError::OutsideApi => "path",
        }
    }
}

#[derive(Debug, Clone)]
pub struct RemoteFallback {
    base: String,
    /// Path every forwarded URL must stay under: base path plus `/api/`.
    api_prefix: String,
    client: reqwest::Client,
    access: AccessPolicy,
}

impl RemoteFallback {
    /// `client` should carry the fallback timeout and no redirect following.
    pub fn new(base: impl Into<String>, client: reqwest::Client, access: AccessPolicy) -> Self {
        let base = base.into().trim_end_matches('/').to_string();
        let base_path = reqwest::Url::parse(&base)
            .map(|url| url.path().trim_end_matches('/').to_string())
            .unwrap_or_default();
        Self {
            api_prefix: format!("{base_path}/api/"),
            base,
            client,
            access,
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    /// Headers sent upstream for `inbound`.
    pub fn forward_headers(&self, inbound: &HeaderMap) -> HeaderMap {
        let mut headers = inbound.clone();
        strip_hop_by_hop(&mut headers);
        for name in [
            header::ORIGIN,
            header::HOST,
            header::CONTENT_LENGTH,
            header::ACCEPT_ENCODING,
        ] {
            headers.remove(name);
        }

        let carries_gateway_token = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| self.access.is_gateway_credential(v));
        if carries_gateway_token {
            headers.remove(header::AUTHORIZATION);
        }
        headers
    }

    /// The remote URL for `inbound`, after the URL parser has resolved any
    /// dot segments.
    pub fn target_url(&self, inbound: &InboundRequest) -> Result<reqwest::Url, RemoteError> {
        let url = reqwest::Url::parse(&format!("{}{}", self.base, inbound.path_and_query()))
            .map_err(|_| RemoteError::OutsideApi)?;
        if !url.path().starts_with(&self.api_prefix) {
            return Err(RemoteError::OutsideApi);
        }
        Ok(url)
    }

    pub async fn forward(&self, inbound: &InboundRequest) -> Result<Response, RemoteError> {
        let url = self.target_url(inbound)?;
        let mut request = self
            .client
            .request(inbound.method.clone(), url)
            .headers(self.forward_headers(&inbound.headers));
        if !inbound.body.is_empty() {
            request = request.body(inbound.body.clone());
        }

        let upstream = request.send().await?;
        let status = upstream.status();
        let mut headers = upstream.headers().clone();
        let body = upstream.bytes().await?;

        strip_hop_by_hop(&mut headers);
        headers.remove(header::CONTENT_LENGTH);

        tracing::debug!(
            path = %inbound.path,
            status = status.as_u16(),
            "Remote fallback answered"
        );

        let mut response = Response::new(Body::from(body));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn fallback(token: Option<&str>) -> RemoteFallback {
        RemoteFallback::new(
            "https://remote.example.com/",
            reqwest::Client::new(),
            AccessPolicy::new(token.map(str::to_string)),
        )
    }

    #[test]
    fn trims_trailing_slash() {
        assert_eq!(fallback(None).base(), "https://remote.example.com");
    }

    #[test]
    fn drops_local_headers() {
        let mut inbound = HeaderMap::new();
        inbound.insert(header::ORIGIN, HeaderValue::from_static("tauri://localhost"));
        inbound.insert(header::HOST, HeaderValue::from_static("127.0.0.1:46123"));
        inbound.insert(header::CONTENT_LENGTH, HeaderValue::from_static("12"));
        inbound.insert(header::ACCEPT_ENCODING, HeaderValue::from_static("br, gzip"));
        inbound.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
        inbound.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        inbound.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer local-token"));

        let headers = fallback(Some("local-token")).forward_headers(&inbound);
        assert_eq!(headers.len(), 1);
        assert_eq!(headers[header::CONTENT_TYPE], "application/json");
    }

    #[test]
    fn keeps_foreign_authorization() {
        let mut inbound = HeaderMap::new();
        inbound.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer provider-key"));

        let headers = fallback(Some("local-token")).forward_headers(&inbound);
        assert_eq!(headers[header::AUTHORIZATION], "Bearer provider-key");

        let headers = fallback(None).forward_headers(&inbound);
        assert!(headers.contains_key(header::AUTHORIZATION));
    }

    fn inbound(path: &str, query: Option<&str>) -> InboundRequest {
        InboundRequest {
            method: axum::http::Method::GET,
            path: path.to_string(),
            query: query.map(str::to_string),
            headers: HeaderMap::new(),
            body: bytes::Bytes::new(),
        }
    }

    #[test]
    fn target_url_stays_under_api_prefix() {
        let remote = fallback(None);
        let url = remote.target_url(&inbound("/api/news", Some("q=1"))).unwrap();
        assert_eq!(url.as_str(), "https://remote.example.com/api/news?q=1");

        for path in ["/api/../admin/secret", "/api/%2e%2e/internal", "/api/x/../../etc"] {
            assert!(
                matches!(remote.target_url(&inbound(path, None)), Err(RemoteError::OutsideApi)),
                "{path}"
            );
        }
    }

    #[test]
    fn base_path_prefix_cannot_be_escaped() {
        let remote = RemoteFallback::new(
            "https://remote.example.com/tenant/",
            reqwest::Client::new(),
            AccessPolicy::default(),
        );
        let url = remote.target_url(&inbound("/api/news", None)).unwrap();
        assert_eq!(url.path(), "/tenant/api/news");
        assert!(remote.target_url(&inbound("/api/../../other/api/x", None)).is_err());
    }
}
