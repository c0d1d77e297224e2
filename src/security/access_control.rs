//! Access control middleware.
//! Enforces the shared gateway token and the environment key allowlist.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::error::ApiError;
use crate::http::server::AppState;

/// The only route reachable without the token.
pub const STATUS_ROUTE: &str = "/api/service-status";

/// Keys the environment-update and secret-validation routes may touch.
pub const ENV_ALLOWLIST: &[&str] = &[
    "GROQ_API_KEY",
    "OPENROUTER_API_KEY",
    "FRED_API_KEY",
    "EIA_API_KEY",
    "CLOUDFLARE_API_TOKEN",
    "ACLED_ACCESS_TOKEN",
    "WINGBITS_API_KEY",
    "WS_RELAY_URL",
    "VITE_OPENSKY_RELAY_URL",
    "OPENSKY_CLIENT_ID",
    "OPENSKY_CLIENT_SECRET",
    "AISSTREAM_API_KEY",
    "VITE_WS_RELAY_URL",
    "OLLAMA_API_URL",
    "OLLAMA_MODEL",
];

pub fn is_allowlisted(key: &str) -> bool {
    ENV_ALLOWLIST.contains(&key)
}

/// Optional shared token plus the fixed exemption set.
#[derive(Clone, Default)]
pub struct AccessPolicy {
    token: Option<String>,
}

impl std::fmt::Debug for AccessPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessPolicy")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

impl AccessPolicy {
    pub fn new(token: Option<String>) -> Self {
        Self {
            token: token.filter(|t| !t.is_empty()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.token.is_some()
    }

    /// Exact match only; any other spelling is not the status route.
    pub fn is_exempt(path: &str) -> bool {
        path == STATUS_ROUTE
    }

    /// True when `value` is exactly `Bearer <token>`.
    pub fn is_gateway_credential(&self, value: &str) -> bool {
        match (&self.token, value.strip_prefix("Bearer ")) {
            (Some(token), Some(presented)) => timing_safe_eq(presented, token),
            _ => false,
        }
    }

    pub fn authorize(&self, path: &str, headers: &HeaderMap) -> bool {
        if self.token.is_none() || Self::is_exempt(path) {
            return true;
        }
        headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| self.is_gateway_credential(v))
    }
}

/// Constant-time string comparison.
fn timing_safe_eq(a: &str, b: &str) -> bool {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

pub async fn access_control_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    if state.access.authorize(request.uri().path(), request.headers()) {
        return next.run(request).await;
    }
    tracing::warn!(path = %request.uri().path(), "Rejected request without valid token");
    ApiError::Unauthorized.into_response()
}
