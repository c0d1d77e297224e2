//! Inbound request capture.
//!
//! # Responsibilities
//! - Materialize the request body exactly once, bounded by the body limit
//! - Keep method, path, query and headers alongside the buffered body
//! - Hand out cheap views to the local handler and the remote fallback
//!
//! # Design Decisions
//! - `Bytes` clones share the buffer; nothing downstream ever sees a stream
//! - `GET`/`HEAD` bodies are never read
//! - The query string is kept separately so logging can drop it

use std::collections::HashMap;

use axum::{
    body::Body,
    http::{header, HeaderMap, Method, Request},
};
use bytes::{Bytes, BytesMut};
use futures_util::StreamExt;

use crate::error::ApiError;
use crate::handlers::LocalRequest;

/// A fully buffered inbound request.
#[derive(Debug, Clone)]
pub struct InboundRequest {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl InboundRequest {
    /// Capture a request, reading at most `limit` body bytes.
    pub async fn materialize(request: Request<Body>, limit: usize) -> Result<Self, ApiError> {
        let (parts, body) = request.into_parts();

        let body = if parts.method == Method::GET || parts.method == Method::HEAD {
            Bytes::new()
        } else {
            let declared = parts
                .headers
                .get(header::CONTENT_LENGTH)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<usize>().ok());
            if declared.is_some_and(|len| len > limit) {
                return Err(ApiError::PayloadTooLarge);
            }
            read_limited(body, limit).await?
        };

        Ok(Self {
            method: parts.method,
            path: parts.uri.path().to_string(),
            query: parts.uri.query().map(str::to_string),
            headers: parts.headers,
            body,
        })
    }

    /// Path plus query string, as forwarded to the remote base.
    pub fn path_and_query(&self) -> String {
        match &self.query {
            Some(query) => format!("{}?{}", self.path, query),
            None => self.path.clone(),
        }
    }

    /// Build the handler view: `Origin` removed, route parameters attached.
    pub fn to_local(&self, params: HashMap<String, String>) -> LocalRequest {
        let mut headers = self.headers.clone();
        headers.remove(header::ORIGIN);
        LocalRequest {
            method: self.method.clone(),
            path: self.path.clone(),
            query: self.query.clone(),
            headers,
            body: self.body.clone(),
            params,
        }
    }
}

/// Buffer `body`; over `limit` is 413, a broken stream (aborted upload) is 400.
async fn read_limited(body: Body, limit: usize) -> Result<Bytes, ApiError> {
    let mut stream = body.into_data_stream();
    let mut buf = BytesMut::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| {
            tracing::debug!(error = %e, "Request body read failed");
            ApiError::BadRequest("Failed to read request body".to_string())
        })?;
        if buf.len() + chunk.len() > limit {
            return Err(ApiError::PayloadTooLarge);
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(buf.freeze())
}
