//! Response pipeline middleware.
//!
//! # Responsibilities
//! - Answer CORS preflight (`OPTIONS`) before authentication and routing
//! - Compress final bodies when negotiated and above the size threshold
//! - Merge `Origin` and `Accept-Encoding` into `Vary` on every response
//! - Attach CORS headers and `no-store` on uncached error responses
//!
//! # Data Flow
//! ```text
//! request ──▶ OPTIONS? ──yes──▶ 204 + CORS headers
//!                 │no
//!                 ▼
//!           inner service (auth, admin routes, dispatcher)
//!                 │
//!                 ▼
//!           compress? ─▶ Vary merge ─▶ CORS ─▶ Cache-Control on errors
//! ```

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::config::{CompressionConfig, CorsConfig};
use crate::http::compression::{AcceptEncoding, Compressor};
use crate::http::server::AppState;

pub const ALLOW_METHODS: &str = "GET, POST, PUT, DELETE, OPTIONS";
pub const ALLOW_HEADERS: &str = "Content-Type, Authorization";

/// Per-response header policy shared by every route.
#[derive(Debug, Clone)]
pub struct ResponsePipeline {
    allowed_origins: Vec<String>,
    max_age: HeaderValue,
    compressor: Compressor,
}

impl ResponsePipeline {
    pub fn new(cors: &CorsConfig, compression: &CompressionConfig) -> Self {
        Self {
            allowed_origins: cors.allowed_origins.clone(),
            max_age: HeaderValue::from(cors.max_age_secs),
            compressor: Compressor::new(compression),
        }
    }

    /// `*` with no allowlist; otherwise the request origin when listed.
    fn allow_origin(&self, origin: Option<&HeaderValue>) -> Option<HeaderValue> {
        if self.allowed_origins.is_empty() {
            return Some(HeaderValue::from_static("*"));
        }
        let origin = origin?;
        let value = origin.to_str().ok()?;
        self.allowed_origins
            .iter()
            .any(|allowed| allowed == value)
            .then(|| origin.clone())
    }

    fn apply_cors(&self, headers: &mut HeaderMap, origin: Option<&HeaderValue>) {
        if let Some(allow) = self.allow_origin(origin) {
            headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, allow);
        }
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOW_METHODS),
        );
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(ALLOW_HEADERS),
        );
    }

    /// Preflight answer, independent of route existence.
    pub fn preflight(&self, origin: Option<&HeaderValue>) -> Response {
        let mut response = StatusCode::NO_CONTENT.into_response();
        let headers = response.headers_mut();
        self.apply_cors(headers, origin);
        headers.insert(header::ACCESS_CONTROL_MAX_AGE, self.max_age.clone());
        merge_vary(headers);
        response
    }

    /// Post-process a final response.
    pub async fn finish(
        &self,
        response: Response,
        origin: Option<&HeaderValue>,
        accept: AcceptEncoding,
        head_request: bool,
    ) -> Response {
        let mut response = if head_request {
            response
        } else {
            self.compress(response, accept).await
        };

        let status = response.status();
        let headers = response.headers_mut();
        merge_vary(headers);
        self.apply_cors(headers, origin);
        if status.as_u16() >= 400 && !headers.contains_key(header::CACHE_CONTROL) {
            headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
        }
        response
    }

    async fn compress(&self, response: Response, accept: AcceptEncoding) -> Response {
        let Some(coding) = accept.preferred() else {
            return response;
        };
        let status = response.status();
        if !self.compressor.is_enabled()
            || status == StatusCode::NO_CONTENT
            || status == StatusCode::NOT_MODIFIED
            || response.headers().contains_key(header::CONTENT_ENCODING)
        {
            return response;
        }
        if let Some(len) = content_length(response.headers()) {
            if !self.compressor.worth_compressing(len) {
                return response;
            }
        }

        let (mut parts, body) = response.into_parts();
        let bytes = match axum::body::to_bytes(body, usize::MAX).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to buffer response body for compression");
                return (StatusCode::BAD_GATEWAY, "Failed to read response body").into_response();
            }
        };
        if !self.compressor.worth_compressing(bytes.len()) {
            return Response::from_parts(parts, Body::from(bytes));
        }

        match self.compressor.encode(&bytes, coding) {
            Some(encoded) => {
                parts
                    .headers
                    .insert(header::CONTENT_ENCODING, coding.header_value());
                parts
                    .headers
                    .insert(header::CONTENT_LENGTH, HeaderValue::from(encoded.len()));
                Response::from_parts(parts, Body::from(encoded))
            }
            None => Response::from_parts(parts, Body::from(bytes)),
        }
    }
}

fn content_length(headers: &HeaderMap) -> Option<usize> {
    headers
        .get(header::CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .parse()
        .ok()
}

/// Merge `Origin` and `Accept-Encoding` into `Vary` without duplicates.
pub fn merge_vary(headers: &mut HeaderMap) {
    let mut values: Vec<String> = headers
        .get_all(header::VARY)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect();

    if values.iter().any(|v| v == "*") {
        return;
    }
    for required in ["Origin", "Accept-Encoding"] {
        if !values.iter().any(|v| v.eq_ignore_ascii_case(required)) {
            values.push(required.to_string());
        }
    }

    let mut deduped: Vec<String> = Vec::with_capacity(values.len());
    for value in values {
        if !deduped.iter().any(|v| v.eq_ignore_ascii_case(&value)) {
            deduped.push(value);
        }
    }

    if let Ok(value) = HeaderValue::from_str(&deduped.join(", ")) {
        headers.insert(header::VARY, value);
    }
}

/// Middleware entry point.
pub async fn response_pipeline(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let origin = request.headers().get(header::ORIGIN).cloned();
    if request.method() == Method::OPTIONS {
        return state.pipeline.preflight(origin.as_ref());
    }

    let accept = AcceptEncoding::from_headers(request.headers());
    let head_request = request.method() == Method::HEAD;
    let response = next.run(request).await;
    state
        .pipeline
        .finish(response, origin.as_ref(), accept, head_request)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pipeline() -> ResponsePipeline {
        ResponsePipeline::new(&CorsConfig::default(), &CompressionConfig::default())
    }

    #[test]
    fn vary_merge_is_case_insensitive() {
        let mut headers = HeaderMap::new();
        headers.insert(header::VARY, HeaderValue::from_static("accept-encoding, Cookie"));
        merge_vary(&mut headers);
        assert_eq!(headers[header::VARY], "accept-encoding, Cookie, Origin");
    }

    #[test]
    fn vary_added_when_missing() {
        let mut headers = HeaderMap::new();
        merge_vary(&mut headers);
        assert_eq!(headers[header::VARY], "Origin, Accept-Encoding");
    }

    #[test]
    fn preflight_headers() {
        let response = pipeline().preflight(None);
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        let headers = response.headers();
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_METHODS], ALLOW_METHODS);
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_HEADERS], ALLOW_HEADERS);
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(headers[header::ACCESS_CONTROL_MAX_AGE], "86400");
    }

    #[test]
    fn allowlisted_origin_is_echoed() {
        let cors = CorsConfig {
            allowed_origins: vec!["tauri://localhost".into()],
            ..CorsConfig::default()
        };
        let pipeline = ResponsePipeline::new(&cors, &CompressionConfig::default());
        let listed = HeaderValue::from_static("tauri://localhost");
        let other = HeaderValue::from_static("https://evil.example");
        assert_eq!(pipeline.allow_origin(Some(&listed)), Some(listed.clone()));
        assert_eq!(pipeline.allow_origin(Some(&other)), None);
        assert_eq!(pipeline.allow_origin(None), None);
    }

    #[tokio::test]
    async fn errors_get_no_store_unless_cached() {
        let pipeline = pipeline();
        let response = pipeline
            .finish(
                StatusCode::NOT_FOUND.into_response(),
                None,
                AcceptEncoding::default(),
                false,
            )
            .await;
        assert_eq!(response.headers()[header::CACHE_CONTROL], "no-store");

        let cached = (
            StatusCode::SERVICE_UNAVAILABLE,
            [(header::CACHE_CONTROL, "max-age=30")],
        )
            .into_response();
        let response = pipeline
            .finish(cached, None, AcceptEncoding::default(), false)
            .await;
        assert_eq!(response.headers()[header::CACHE_CONTROL], "max-age=30");
    }

    #[tokio::test]
    async fn head_and_small_bodies_are_not_compressed() {
        let pipeline = pipeline();
        let accept = AcceptEncoding::parse("br, gzip");

        let small = pipeline
            .finish("x".repeat(1024).into_response(), None, accept, false)
            .await;
        assert!(!small.headers().contains_key(header::CONTENT_ENCODING));

        let head = pipeline
            .finish("x".repeat(4096).into_response(), None, accept, true)
            .await;
        assert!(!head.headers().contains_key(header::CONTENT_ENCODING));

        let large = pipeline
            .finish("x".repeat(4096).into_response(), None, accept, false)
            .await;
        assert_eq!(large.headers()[header::CONTENT_ENCODING], "br");
    }
}
