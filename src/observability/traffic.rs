//! In-memory traffic log.
//!
//! A bounded ring of recent requests shown by the desktop UI. Entries carry
//! the path only; the query string is dropped before recording.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use serde::Serialize;

use crate::http::server::AppState;
use crate::observability::metrics;

/// Requests to this route are not recorded.
pub const TRAFFIC_ROUTE: &str = "/api/local-traffic-log";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrafficLogEntry {
    pub timestamp: String,
    pub method: String,
    pub path: String,
    pub status: u16,
    pub duration_ms: u64,
}

impl TrafficLogEntry {
    /// Build an entry; anything after `?` in `path` is discarded.
    pub fn new(at: DateTime<Utc>, method: &str, path: &str, status: u16, duration_ms: u64) -> Self {
        let path = path.split_once('?').map_or(path, |(path, _)| path);
        Self {
            timestamp: at.to_rfc3339_opts(SecondsFormat::Millis, true),
            method: method.to_string(),
            path: path.to_string(),
            status,
            duration_ms,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TrafficLog {
    entries: Arc<Mutex<VecDeque<TrafficLogEntry>>>,
    capacity: usize,
}

impl TrafficLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }

    /// Append, evicting the oldest entry when full.
    pub fn record(&self, entry: TrafficLogEntry) {
        if self.capacity == 0 {
            return;
        }
        let mut entries = self.entries.lock();
        while entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// Oldest first.
    pub fn entries(&self) -> Vec<TrafficLogEntry> {
        self.entries.lock().iter().cloned().collect()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub async fn record_traffic(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let response = next.run(request).await;

    let status = response.status().as_u16();
    metrics::record_request(method.as_str(), status, start);
    if path.trim_end_matches('/') != TRAFFIC_ROUTE {
        let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
        state.traffic.record(TrafficLogEntry::new(
            Utc::now(),
            method.as_str(),
            &path,
            status,
            duration_ms,
        ));
    }
    response
}
