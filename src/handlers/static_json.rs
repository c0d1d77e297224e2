//! `static` kind: fixed status, content type and body.
//!
//! ```toml
//! kind = "static"
//! status = 200
//! content_type = "application/json"
//! body = '{"items": []}'
//! # or a structured body, serialized as JSON:
//! # json = { items = [] }
//! [headers]
//! cache-control = "public, max-age=60"
//! ```

use std::collections::BTreeMap;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, HeaderName, HeaderValue, StatusCode},
    response::Response,
};
use bytes::Bytes;
use serde::de::Error as _;
use serde::Deserialize;

use crate::handlers::{catalog::parse_options, Handler, HandlerContext, HandlerError, LocalRequest};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct StaticOptions {
    #[serde(default = "default_status")]
    status: u16,
    content_type: Option<String>,
    body: Option<String>,
    json: Option<toml::Value>,
    #[serde(default)]
    headers: BTreeMap<String, String>,
}

fn default_status() -> u16 {
    200
}

#[derive(Debug, Clone)]
pub struct StaticHandler {
    status: StatusCode,
    headers: Vec<(HeaderName, HeaderValue)>,
    body: Bytes,
}

impl StaticHandler {
    /// `200 application/json` with the given body.
    pub fn json(body: &str) -> Self {
        Self {
            status: StatusCode::OK,
            headers: vec![(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            )],
            body: Bytes::copy_from_slice(body.as_bytes()),
        }
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    pub fn from_options(options: toml::Table) -> Result<Self, toml::de::Error> {
        let options: StaticOptions = parse_options(options)?;
        let status = StatusCode::from_u16(options.status)
            .map_err(|_| toml::de::Error::custom(format!("invalid status {}", options.status)))?;

        let body = match (options.body, options.json) {
            (Some(_), Some(_)) => {
                return Err(toml::de::Error::custom("set either `body` or `json`, not both"))
            }
            (Some(body), None) => Bytes::from(body),
            (None, Some(json)) => serde_json::to_vec(&json)
                .map(Bytes::from)
                .map_err(|e| toml::de::Error::custom(e.to_string()))?,
            (None, None) => Bytes::new(),
        };

        let content_type = options
            .content_type
            .unwrap_or_else(|| "application/json".to_string());
        let mut headers = vec![(header::CONTENT_TYPE, header_value(&content_type)?)];
        for (name, value) in &options.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| toml::de::Error::custom(format!("invalid header name {name:?}")))?;
            headers.push((name, header_value(value)?));
        }

        Ok(Self {
            status,
            headers,
            body,
        })
    }
}

fn header_value(value: &str) -> Result<HeaderValue, toml::de::Error> {
    HeaderValue::from_str(value)
        .map_err(|_| toml::de::Error::custom(format!("invalid header value {value:?}")))
}

#[async_trait]
impl Handler for StaticHandler {
    async fn call(&self, _req: LocalRequest, _ctx: &HandlerContext) -> Result<Response, HandlerError> {
        let mut builder = Response::builder().status(self.status);
        for (name, value) in &self.headers {
            builder = builder.header(name, value);
        }
        builder
            .body(Body::from(self.body.clone()))
            .map_err(|e| HandlerError::Internal(e.to_string()))
    }
}
