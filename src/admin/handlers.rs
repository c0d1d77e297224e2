//! Operational route handlers.

use axum::{
    extract::State,
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::ApiError;
use crate::http::server::AppState;
use crate::net::ServerBinding;
use crate::routing::Registry;
use crate::security::is_allowlisted;

/// A descriptor that did not make it into the route table.
#[derive(Debug, Clone, Serialize)]
pub struct FailedRoute {
    pub file: String,
    pub error: String,
}

/// Startup facts reported by the status route.
#[derive(Debug, Clone)]
pub struct GatewayInfo {
    pub mode: String,
    pub binding: ServerBinding,
    pub remote_base: String,
    pub fallback_enabled: bool,
    pub routes: usize,
    pub failed_routes: Vec<FailedRoute>,
}

impl GatewayInfo {
    pub fn new(
        mode: &str,
        binding: ServerBinding,
        remote_base: &str,
        fallback_enabled: bool,
        registry: &Registry,
    ) -> Self {
        let failed_routes = registry
            .failures()
            .iter()
            .map(|failure| FailedRoute {
                file: failure.path.display().to_string(),
                error: failure.error.to_string(),
            })
            .collect();
        Self {
            mode: mode.to_string(),
            binding,
            remote_base: remote_base.to_string(),
            fallback_enabled,
            routes: registry.routes().len(),
            failed_routes,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LocalStatus<'a> {
    enabled: bool,
    mode: &'a str,
    host: &'a str,
    port: u16,
    requested_port: u16,
    recovered: bool,
    remote_base: &'a str,
    fallback_enabled: bool,
    routes: usize,
    failed_routes: &'a [FailedRoute],
}

#[derive(Serialize)]
struct ServiceEntry {
    id: &'static str,
    name: &'static str,
    status: &'static str,
    description: String,
}

pub async fn service_status(State(state): State<AppState>) -> Response {
    let info = &state.info;
    let binding = &info.binding;

    let local = LocalStatus {
        enabled: true,
        mode: &info.mode,
        host: &binding.host,
        port: binding.port,
        requested_port: binding.requested_port,
        recovered: binding.recovered,
        remote_base: &info.remote_base,
        fallback_enabled: info.fallback_enabled,
        routes: info.routes,
        failed_routes: &info.failed_routes,
    };
    let services = [
        ServiceEntry {
            id: "local-api",
            name: "Local API gateway",
            status: "ok",
            description: binding.description(),
        },
        ServiceEntry {
            id: "remote-fallback",
            name: "Remote fallback",
            status: if info.fallback_enabled { "ok" } else { "disabled" },
            description: info.remote_base.clone(),
        },
    ];

    Json(json!({
        "success": true,
        "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        "local": local,
        "services": services,
    }))
    .into_response()
}

pub async fn traffic_log(State(state): State<AppState>) -> Response {
    Json(json!({ "entries": state.traffic.entries() })).into_response()
}

pub async fn clear_traffic_log(State(state): State<AppState>) -> Response {
    state.traffic.clear();
    Json(json!({ "success": true })).into_response()
}

#[derive(Debug, Deserialize)]
struct EnvUpdate {
    key: String,
    #[serde(default)]
    value: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SecretCandidate {
    key: String,
    value: String,
}

fn parse_body<T: serde::de::DeserializeOwned>(body: &Bytes) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|_| ApiError::BadRequest("Invalid JSON body".to_string()))
}

fn ensure_allowlisted(key: &str) -> Result<(), ApiError> {
    if is_allowlisted(key) {
        Ok(())
    } else {
        tracing::warn!(key = %key, "Rejected key outside allowlist");
        Err(ApiError::Forbidden("key not in allowlist".to_string()))
    }
}

pub async fn env_update(State(state): State<AppState>, body: Bytes) -> Result<Response, ApiError> {
    let update: EnvUpdate = parse_body(&body)?;
    ensure_allowlisted(&update.key)?;

    let action = match update.value.as_deref().map(str::trim) {
        Some(value) if !value.is_empty() => {
            state.env.set(&update.key, value);
            "set"
        }
        _ => {
            state.env.remove(&update.key);
            "removed"
        }
    };
    tracing::info!(key = %update.key, action, "Environment updated");

    Ok(Json(json!({ "success": true, "key": update.key, "action": action })).into_response())
}

pub async fn validate_secret(State(state): State<AppState>, body: Bytes) -> Result<Response, ApiError> {
    let candidate: SecretCandidate = parse_body(&body)?;
    ensure_allowlisted(&candidate.key)?;

    let result = state
        .probe
        .check(&candidate.key, &candidate.value)
        .await
        .map_err(|e| ApiError::Unprocessable(e.to_string()))?;
    if result.valid {
        state.env.set(&candidate.key, candidate.value.trim());
    }
    Ok(Json(result).into_response())
}
