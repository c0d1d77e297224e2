//! Live secret validation.
//!
//! # Responsibilities
//! - Run provider-specific connectivity checks for a candidate value
//! - Classify provider answers into valid / invalid / soft-pass
//! - Reject malformed URL values before any network call
//!
//! # Design Decisions
//! - A bot-challenge page (HTML 403 with `cf-mitigated: challenge`) or a 429
//!   says nothing about the key itself, so both soft-pass
//! - A structured (JSON) 403 is the provider speaking, so it hard-fails
//!   even when the challenge header is present
//! - Messages and logs carry the provider and failure class, never the value
//!   or the probe URL (query-string keys would leak)

use std::collections::HashMap;

use axum::http::{header, HeaderMap, StatusCode};
use serde::Serialize;
use url::Url;

use crate::resilience::timeouts::FailureClass;
use crate::secrets::providers::{probe_kind, HostedProvider, KeyPlacement, ProbeKind};

/// Probe answer returned to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeResult {
    pub valid: bool,
    pub message: String,
}

impl ProbeResult {
    fn valid(message: impl Into<String>) -> Self {
        Self {
            valid: true,
            message: message.into(),
        }
    }

    fn invalid(message: impl Into<String>) -> Self {
        Self {
            valid: false,
            message: message.into(),
        }
    }
}

/// Values rejected before any network call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProbeError {
    #[error("Must be an http(s) URL")]
    NotHttpUrl,

    #[error("Must be a ws(s) or http(s) URL")]
    NotRelayUrl,
}

#[derive(Debug, Clone)]
pub struct SecretProbe {
    client: reqwest::Client,
    endpoints: HashMap<String, String>,
}

impl SecretProbe {
    /// `endpoints` overrides the probe URL per key.
    pub fn new(client: reqwest::Client, endpoints: HashMap<String, String>) -> Self {
        Self { client, endpoints }
    }

    pub async fn check(&self, key: &str, value: &str) -> Result<ProbeResult, ProbeError> {
        let value = value.trim();
        if value.is_empty() {
            return Ok(ProbeResult::invalid("Value must not be empty"));
        }

        let result = match probe_kind(key) {
            ProbeKind::ModelEndpoint => self.check_model_endpoint(value).await?,
            ProbeKind::Hosted(provider) => self.check_hosted(key, provider, value).await,
            ProbeKind::RelayUrl => {
                let url = Url::parse(value).map_err(|_| ProbeError::NotRelayUrl)?;
                if !matches!(url.scheme(), "ws" | "wss" | "http" | "https") || !url.has_host() {
                    return Err(ProbeError::NotRelayUrl);
                }
                ProbeResult::valid("Relay URL saved without live verification")
            }
            ProbeKind::Unverified => ProbeResult::valid("Saved without live verification"),
        };

        tracing::info!(key = %key, valid = result.valid, "Secret probe finished");
        Ok(result)
    }

    async fn check_model_endpoint(&self, value: &str) -> Result<ProbeResult, ProbeError> {
        let url = Url::parse(value).map_err(|_| ProbeError::NotHttpUrl)?;
        if !matches!(url.scheme(), "http" | "https") || !url.has_host() {
            return Err(ProbeError::NotHttpUrl);
        }
        let root = value.trim_end_matches('/');

        let response = match self.client.get(format!("{root}/v1/models")).send().await {
            Ok(response) => response,
            Err(e) => return Ok(unreachable("Model endpoint", &e)),
        };
        if response.status().is_success() {
            return Ok(ProbeResult::valid(
                "Model endpoint reachable (OpenAI-compatible API at /v1/models)",
            ));
        }
        if response.status() != StatusCode::NOT_FOUND {
            return Ok(ProbeResult::invalid(format!(
                "Model endpoint returned HTTP {}",
                response.status().as_u16()
            )));
        }

        match self.client.get(format!("{root}/api/tags")).send().await {
            Ok(response) if response.status().is_success() => Ok(ProbeResult::valid(
                "Model endpoint reachable (Ollama native API at /api/tags)",
            )),
            Ok(response) => Ok(ProbeResult::invalid(format!(
                "Model endpoint returned HTTP {} for /v1/models and /api/tags",
                response.status().as_u16()
            ))),
            Err(e) => Ok(unreachable("Model endpoint", &e)),
        }
    }

    async fn check_hosted(&self, key: &str, provider: HostedProvider, value: &str) -> ProbeResult {
        let endpoint = self
            .endpoints
            .get(key)
            .map(String::as_str)
            .unwrap_or(provider.url);
        let Ok(mut url) = Url::parse(endpoint) else {
            return ProbeResult::invalid(format!("{} probe endpoint is misconfigured", provider.name));
        };

        let request = match provider.placement {
            KeyPlacement::Bearer => self.client.get(url).bearer_auth(value),
            KeyPlacement::Query(param) => {
                url.query_pairs_mut().append_pair(param, value);
                self.client.get(url)
            }
        };

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => return unreachable(provider.name, &e),
        };
        let status = response.status();
        let headers = response.headers().clone();
        let body = if status == StatusCode::FORBIDDEN {
            read_prefix(response, FORBIDDEN_BODY_CAP).await
        } else {
            Default::default()
        };

        classify_hosted(provider.name, status, &headers, &body)
    }
}

/// Enough of a 403 body to tell JSON from an HTML challenge page.
const FORBIDDEN_BODY_CAP: usize = 4096;

/// Read at most `cap` bytes; a broken stream yields what arrived so far.
async fn read_prefix(mut response: reqwest::Response, cap: usize) -> Vec<u8> {
    let mut body = Vec::new();
    while body.len() < cap {
        match response.chunk().await {
            Ok(Some(chunk)) => {
                let take = chunk.len().min(cap - body.len());
                body.extend_from_slice(&chunk[..take]);
            }
            Ok(None) | Err(_) => break,
        }
    }
    body
}

fn unreachable(name: &str, error: &reqwest::Error) -> ProbeResult {
    let class = FailureClass::of(error);
    tracing::warn!(provider = %name, failure = class.as_str(), "Secret probe request failed");
    ProbeResult::invalid(format!("{name} unreachable ({})", class.as_str()))
}

/// Classify a hosted provider's answer.
pub fn classify_hosted(name: &str, status: StatusCode, headers: &HeaderMap, body: &[u8]) -> ProbeResult {
    if status.is_success() {
        return ProbeResult::valid(format!("{name} key verified"));
    }
    match status {
        StatusCode::UNAUTHORIZED => ProbeResult::invalid(format!("{name} rejected the key")),
        StatusCode::TOO_MANY_REQUESTS => ProbeResult::valid(format!(
            "{name} rate limited the check; key saved without verification"
        )),
        StatusCode::FORBIDDEN => {
            if is_structured(headers, body) {
                ProbeResult::invalid(format!("{name} denied access (HTTP 403)"))
            } else if is_html(headers, body) && is_challenge(headers) {
                ProbeResult::valid(format!(
                    "{name} could not be verified (blocked by an intermediary challenge); key saved"
                ))
            } else {
                ProbeResult::invalid(format!("{name} denied access (HTTP 403)"))
            }
        }
        other => ProbeResult::invalid(format!("{name} returned HTTP {}", other.as_u16())),
    }
}

fn content_type(headers: &HeaderMap) -> String {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase()
}

fn body_prefix(body: &[u8]) -> String {
    let start = body.iter().position(|b| !b.is_ascii_whitespace()).unwrap_or(body.len());
    let end = body.len().min(start + 32);
    String::from_utf8_lossy(&body[start..end]).to_ascii_lowercase()
}

fn is_structured(headers: &HeaderMap, body: &[u8]) -> bool {
    let prefix = body_prefix(body);
    content_type(headers).contains("json") || prefix.starts_with('{') || prefix.starts_with('[')
}

fn is_html(headers: &HeaderMap, body: &[u8]) -> bool {
    let prefix = body_prefix(body);
    content_type(headers).contains("text/html")
        || prefix.starts_with("<!doctype html")
        || prefix.starts_with("<html")
}

fn is_challenge(headers: &HeaderMap) -> bool {
    headers
        .get("cf-mitigated")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.trim().eq_ignore_ascii_case("challenge"))
}
