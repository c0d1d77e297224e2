//! Response shaping.
//!
//! # Responsibilities
//! - Turn a [`DispatchOutcome`] into the client response
//! - Strip hop-by-hop headers from forwarded requests and responses
//!
//! # Design Decisions
//! - Remote responses are returned verbatim apart from hop-by-hop headers
//! - Error outcomes go through [`ApiError`] so every error body is JSON

use axum::{
    http::{header, HeaderMap, HeaderName},
    response::{IntoResponse, Response},
};

use crate::dispatch::DispatchOutcome;
use crate::error::ApiError;

/// Connection-scoped headers that never cross a proxy hop.
pub const HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Remove hop-by-hop headers, including any named by `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let named: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in named.iter().chain(HOP_BY_HOP.iter()) {
        headers.remove(name);
    }
}

impl IntoResponse for DispatchOutcome {
    fn into_response(self) -> Response {
        match self {
            DispatchOutcome::ServedLocal(response)
            | DispatchOutcome::FellBackToRemote(response)
            | DispatchOutcome::RemoteOnly(response) => response,
            DispatchOutcome::NotFound => ApiError::NotFound.into_response(),
            DispatchOutcome::HandlerFault(reason) => ApiError::HandlerFault(reason).into_response(),
            DispatchOutcome::RemoteUnavailable(reason) => {
                ApiError::RemoteUnavailable(reason).into_response()
            }
        }
    }
}
