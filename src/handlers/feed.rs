//! `feed-fetch` kind: SSRF-guarded fetch of a client-supplied feed URL.
//!
//! `GET <feed route>?url=<target>`. Every hop (including redirects) is
//! checked by the guard and pinned to the address that was validated.

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use bytes::{Bytes, BytesMut};
use serde_json::json;
use url::{Host, Url};

use crate::error::{json_error, json_response, ApiError};
use crate::handlers::{Handler, HandlerContext, HandlerError, LocalRequest};
use crate::resilience::timeouts::FailureClass;
use crate::security::ssrf::{GuardError, SsrfGuard};

pub const DEFAULT_CACHE_CONTROL: &str = "public, max-age=300";

#[derive(Debug, Clone, Copy, Default)]
pub struct FeedFetchHandler;

/// Why a fetch did not produce a feed.
#[derive(Debug, thiserror::Error)]
enum FetchError {
    #[error(transparent)]
    Guard(#[from] GuardError),

    #[error("transport failure")]
    Transport(#[from] reqwest::Error),

    #[error("too many redirects")]
    TooManyRedirects,

    #[error("invalid redirect location")]
    BadRedirect,

    #[error("feed exceeds {0} bytes")]
    TooLarge(usize),
}

impl FetchError {
    fn into_response(self) -> Response {
        match self {
            FetchError::Guard(GuardError::Blocked(violation)) => {
                ApiError::Forbidden(violation.to_string()).into_response()
            }
            FetchError::Transport(e) if e.is_timeout() => {
                json_error(StatusCode::GATEWAY_TIMEOUT, "Feed fetch timed out")
            }
            FetchError::Transport(e) => json_response(
                StatusCode::BAD_GATEWAY,
                json!({ "error": "Failed to fetch feed", "reason": FailureClass::of(&e).as_str() }),
            ),
            FetchError::TooLarge(_) => json_error(StatusCode::BAD_GATEWAY, "Feed too large"),
            other => json_response(
                StatusCode::BAD_GATEWAY,
                json!({ "error": "Failed to fetch feed", "reason": other.to_string() }),
            ),
        }
    }
}

struct Fetched {
    status: StatusCode,
    content_type: Option<HeaderValue>,
    cache_control: Option<HeaderValue>,
    body: Bytes,
}

impl FeedFetchHandler {
    async fn fetch(&self, mut url: Url, ctx: &HandlerContext) -> Result<Fetched, FetchError> {
        let guard = &ctx.ssrf;
        let mut redirects = 0;

        loop {
            guard.check_url(&url).map_err(GuardError::from)?;
            let pinned = guard.resolve(&url).await?;

            let mut builder = ctx.timeouts.guarded_builder();
            if let (Some(addr), Some(Host::Domain(domain))) = (pinned, url.host()) {
                builder = builder.resolve(domain, addr);
            }
            let client = builder.build()?;

            let mut response = client
                .get(url.clone())
                .header(
                    header::ACCEPT,
                    "application/rss+xml, application/atom+xml, application/xml, text/xml, */*",
                )
                .send()
                .await?;

            let status = response.status();
            if status.is_redirection() {
                if let Some(location) = response.headers().get(header::LOCATION) {
                    redirects += 1;
                    if redirects > guard.max_redirects() {
                        return Err(FetchError::TooManyRedirects);
                    }
                    url = next_hop(&url, location, guard)?;
                    continue;
                }
            }

            let limit = ctx.max_feed_bytes;
            if response.content_length().is_some_and(|len| len as usize > limit) {
                return Err(FetchError::TooLarge(limit));
            }

            let content_type = response.headers().get(header::CONTENT_TYPE).cloned();
            let cache_control = response.headers().get(header::CACHE_CONTROL).cloned();

            let mut body = BytesMut::new();
            while let Some(chunk) = response.chunk().await? {
                if body.len() + chunk.len() > limit {
                    return Err(FetchError::TooLarge(limit));
                }
                body.extend_from_slice(&chunk);
            }

            return Ok(Fetched {
                status,
                content_type,
                cache_control,
                body: body.freeze(),
            });
        }
    }
}

/// Resolve a redirect `Location` against `current` and re-check it.
fn next_hop(current: &Url, location: &HeaderValue, guard: &SsrfGuard) -> Result<Url, FetchError> {
    let location = location.to_str().map_err(|_| FetchError::BadRedirect)?;
    let next = current.join(location).map_err(|_| FetchError::BadRedirect)?;
    guard.check_url(&next).map_err(GuardError::from)?;
    Ok(next)
}

#[async_trait]
impl Handler for FeedFetchHandler {
    async fn call(&self, req: LocalRequest, ctx: &HandlerContext) -> Result<Response, HandlerError> {
        let Some(target) = req.query_param("url").filter(|u| !u.trim().is_empty()) else {
            return Ok(ApiError::BadRequest("Missing url parameter".into()).into_response());
        };
        let Ok(url) = Url::parse(target.trim()) else {
            return Ok(ApiError::BadRequest("Invalid url".into()).into_response());
        };

        let fetched = match self.fetch(url, ctx).await {
            Ok(fetched) => fetched,
            Err(e) => {
                // The target URL is client data and may carry tokens; log the class only.
                tracing::warn!(error = %e, "Feed fetch failed");
                return Ok(e.into_response());
            }
        };

        let mut response = (fetched.status, Body::from(fetched.body)).into_response();
        let headers = response.headers_mut();
        if let Some(content_type) = fetched.content_type {
            headers.insert(header::CONTENT_TYPE, content_type);
        }
        headers.insert(
            header::CACHE_CONTROL,
            fetched
                .cache_control
                .unwrap_or_else(|| HeaderValue::from_static(DEFAULT_CACHE_CONTROL)),
        );
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;

    use axum::http::{HeaderMap, Method};

    use crate::config::SsrfConfig;
    use crate::resilience::timeouts::EgressTimeouts;
    use crate::secrets::EnvStore;

    fn ctx() -> HandlerContext {
        HandlerContext {
            client: reqwest::Client::new(),
            env: EnvStore::new(),
            ssrf: Arc::new(SsrfGuard::new(&SsrfConfig::default())),
            timeouts: EgressTimeouts::default(),
            max_feed_bytes: 1024,
        }
    }

    fn request(query: Option<&str>) -> LocalRequest {
        LocalRequest {
            method: Method::GET,
            path: "/api/rss-proxy".into(),
            query: query.map(str::to_string),
            headers: HeaderMap::new(),
            body: Bytes::new(),
            params: HashMap::new(),
        }
    }

    async fn error_of(response: Response) -> (StatusCode, String) {
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        (status, json["error"].as_str().unwrap_or_default().to_string())
    }

    #[tokio::test]
    async fn missing_and_invalid_url() {
        let handler = FeedFetchHandler;
        let response = handler.call(request(None), &ctx()).await.unwrap();
        assert_eq!(
            error_of(response).await,
            (StatusCode::BAD_REQUEST, "Missing url parameter".into())
        );

        let response = handler.call(request(Some("url=not%20a%20url")), &ctx()).await.unwrap();
        assert_eq!(
            error_of(response).await,
            (StatusCode::BAD_REQUEST, "Invalid url".into())
        );
    }

    #[tokio::test]
    async fn private_targets_are_forbidden_before_any_fetch() {
        let handler = FeedFetchHandler;
        for target in [
            "http%3A%2F%2F127.0.0.1%2Frss",
            "http%3A%2F%2F10.0.0.1%2Frss",
            "ftp%3A%2F%2Ffeeds.example.com%2Frss",
            "https%3A%2F%2Fu%3Ap%40feeds.example.com%2Frss",
        ] {
            let response = handler
                .call(request(Some(&format!("url={target}"))), &ctx())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::FORBIDDEN, "{target}");
        }
    }

    #[tokio::test]
    async fn redirects_are_rechecked() {
        let guard = SsrfGuard::new(&SsrfConfig::default());
        let origin = Url::parse("https://feeds.example.com/rss").unwrap();

        let next = next_hop(&origin, &HeaderValue::from_static("/rss/v2"), &guard).unwrap();
        assert_eq!(next.as_str(), "https://feeds.example.com/rss/v2");

        for location in ["http://10.0.0.1/", "http://localhost:8080/admin", "file:///etc/passwd"] {
            let err = next_hop(&origin, &HeaderValue::from_static(location), &guard).unwrap_err();
            assert!(matches!(err, FetchError::Guard(GuardError::Blocked(_))), "{location}");
            assert_eq!(err.into_response().status(), StatusCode::FORBIDDEN, "{location}");
        }
    }
}
