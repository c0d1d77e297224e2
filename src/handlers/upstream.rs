//! `upstream` kind: call a configured upstream API.
//!
//! ```toml
//! kind = "upstream"
//! url = "https://api.stlouisfed.org/fred/series/observations"
//! forward_query = true
//! [query]
//! api_key = "${FRED_API_KEY}"
//! file_type = "json"
//! [headers]
//! accept = "application/json"
//! ```
//!
//! `{param}` placeholders in `url` come from route parameters; `${KEY}`
//! placeholders in `headers` and `query` come from the environment store.

use std::collections::BTreeMap;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, HeaderName, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use serde::de::Error as _;
use serde::Deserialize;
use serde_json::json;

use crate::error::{json_response, ApiError};
use crate::handlers::{
    catalog::parse_options, Handler, HandlerContext, HandlerError, LocalRequest, OutboundRequest,
};
use crate::resilience::timeouts::FailureClass;
use crate::routing::is_dot_segment;
use crate::secrets::EnvStore;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct UpstreamOptions {
    url: String,
    method: Option<String>,
    #[serde(default)]
    forward_query: bool,
    #[serde(default)]
    forward_body: bool,
    #[serde(default)]
    headers: BTreeMap<String, String>,
    #[serde(default)]
    query: BTreeMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct UpstreamHandler {
    url: String,
    method: Option<Method>,
    forward_query: bool,
    forward_body: bool,
    headers: Vec<(HeaderName, String)>,
    query: Vec<(String, String)>,
}

/// Why the target URL could not be built.
#[derive(Debug, PartialEq, Eq)]
enum Unresolved {
    /// A `${KEY}` placeholder with no value in the environment store.
    MissingKey(String),
    /// A route parameter that would move the request up the upstream path.
    DotParam(String),
    InvalidUrl(String),
}

impl From<MissingKey> for Unresolved {
    fn from(missing: MissingKey) -> Self {
        Unresolved::MissingKey(missing.0)
    }
}

#[derive(Debug, PartialEq, Eq)]
struct MissingKey(String);

impl UpstreamHandler {
    pub fn from_options(options: toml::Table) -> Result<Self, toml::de::Error> {
        let options: UpstreamOptions = parse_options(options)?;

        let method = options
            .method
            .map(|m| {
                Method::from_bytes(m.to_ascii_uppercase().as_bytes())
                    .map_err(|_| toml::de::Error::custom(format!("invalid method {m:?}")))
            })
            .transpose()?;

        let headers = options
            .headers
            .into_iter()
            .map(|(name, value)| {
                HeaderName::from_bytes(name.as_bytes())
                    .map(|name| (name, value))
                    .map_err(|_| toml::de::Error::custom(format!("invalid header name {name:?}")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        if !options.url.starts_with("http://") && !options.url.starts_with("https://") {
            return Err(toml::de::Error::custom("`url` must be an http(s) URL"));
        }

        Ok(Self {
            url: options.url,
            method,
            forward_query: options.forward_query,
            forward_body: options.forward_body,
            headers,
            query: options.query.into_iter().collect(),
        })
    }

    fn target_url(&self, req: &LocalRequest, env: &EnvStore) -> Result<reqwest::Url, Unresolved> {
        // Env first, so route parameters can never introduce placeholders.
        let url = fill_params(&fill_env(&self.url, env)?, req)?;
        let mut url =
            reqwest::Url::parse(&url).map_err(|e| Unresolved::InvalidUrl(e.to_string()))?;

        let mut pairs: Vec<(String, String)> = Vec::new();
        if self.forward_query {
            if let Some(query) = req.query.as_deref() {
                pairs.extend(url::form_urlencoded::parse(query.as_bytes()).into_owned());
            }
        }
        for (name, value) in &self.query {
            pairs.push((name.clone(), fill_env(value, env)?));
        }
        if !pairs.is_empty() {
            url.query_pairs_mut().extend_pairs(pairs);
        }
        Ok(url)
    }
}

fn fill_params(template: &str, req: &LocalRequest) -> Result<String, Unresolved> {
    let mut url = template.to_string();
    for (name, value) in &req.params {
        if is_dot_segment(value) {
            return Err(Unresolved::DotParam(name.clone()));
        }
        url = url.replace(&format!("{{{name}}}"), value);
    }
    Ok(url)
}

/// Replace every `${KEY}` with its stored value.
fn fill_env(template: &str, env: &EnvStore) -> Result<String, MissingKey> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            out.push_str(&rest[start..]);
            return Ok(out);
        };
        let key = &after[..end];
        match env.get(key) {
            Some(value) => out.push_str(&value),
            None => return Err(MissingKey(key.to_string())),
        }
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

fn not_configured(key: &str) -> Response {
    json_response(
        StatusCode::SERVICE_UNAVAILABLE,
        json!({ "error": format!("{key} not configured") }),
    )
}

#[async_trait]
impl Handler for UpstreamHandler {
    async fn call(&self, req: LocalRequest, ctx: &HandlerContext) -> Result<Response, HandlerError> {
        let url = match self.target_url(&req, &ctx.env) {
            Ok(url) => url,
            Err(Unresolved::MissingKey(key)) => return Ok(not_configured(&key)),
            Err(Unresolved::DotParam(name)) => {
                tracing::warn!(param = %name, "Rejected dot segment in route parameter");
                return Ok(ApiError::BadRequest("Invalid route parameter".into()).into_response());
            }
            Err(Unresolved::InvalidUrl(reason)) => return Err(HandlerError::InvalidRequest(reason)),
        };

        let mut headers = Vec::with_capacity(self.headers.len());
        for (name, template) in &self.headers {
            let value = match fill_env(template, &ctx.env) {
                Ok(value) => value,
                Err(MissingKey(key)) => return Ok(not_configured(&key)),
            };
            let value = HeaderValue::from_str(&value)
                .map_err(|_| HandlerError::InvalidRequest(format!("invalid value for header {name}")))?;
            headers.push((name.clone(), value));
        }

        let method = self.method.clone().unwrap_or_else(|| req.method.clone());
        let mut outbound = if self.forward_body {
            req.outbound(method, url.as_str())
        } else {
            OutboundRequest::new(method, url.as_str(), Bytes::new())
        };
        if self.forward_body {
            if let Some(content_type) = req.headers.get(header::CONTENT_TYPE) {
                outbound = outbound.header(header::CONTENT_TYPE, content_type.clone());
            }
        }
        for (name, value) in headers {
            outbound = outbound.header(name, value);
        }

        let response = match outbound
            .into_request(&ctx.client)?
            .timeout(ctx.timeouts.egress)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                let class = FailureClass::of(&e);
                tracing::warn!(
                    path = %req.path,
                    failure = class.as_str(),
                    "Upstream request failed"
                );
                let status = if class == FailureClass::Timeout {
                    StatusCode::GATEWAY_TIMEOUT
                } else {
                    StatusCode::BAD_GATEWAY
                };
                return Ok(json_response(
                    status,
                    json!({ "error": "Upstream request failed", "reason": class.as_str() }),
                ));
            }
        };

        let status = response.status();
        let content_type = response.headers().get(header::CONTENT_TYPE).cloned();
        let cache_control = response.headers().get(header::CACHE_CONTROL).cloned();
        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) => {
                let class = FailureClass::of(&e);
                return Ok(json_response(
                    StatusCode::BAD_GATEWAY,
                    json!({ "error": "Upstream request failed", "reason": class.as_str() }),
                ));
            }
        };

        let mut response = (status, Body::from(body)).into_response();
        if let Some(value) = content_type {
            response.headers_mut().insert(header::CONTENT_TYPE, value);
        }
        if let Some(value) = cache_control {
            response.headers_mut().insert(header::CACHE_CONTROL, value);
        }
        Ok(response)
    }
}
