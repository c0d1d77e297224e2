//! Request dispatch subsystem.
//!
//! # Data Flow
//! ```text
//! InboundRequest (body buffered once)
//!     → dispatcher.rs (route lookup)
//!         ├─ outside /api/          → NotFound
//!         ├─ no route, no fallback  → NotFound
//!         ├─ no route, fallback     → remote.rs → RemoteOnly | RemoteUnavailable
//!         └─ route
//!             → Handler::call (panics caught)
//!                 ├─ Err / panic      → HandlerFault (never retried)
//!                 ├─ status >= 500    → remote.rs → FellBackToRemote
//!                 │                     (transport failure keeps the local answer)
//!                 └─ otherwise        → ServedLocal
//! ```
//!
//! # Design Decisions
//! - The remote call always replays the original buffered body
//! - Every outcome is counted, labelled by variant

pub mod dispatcher;
pub mod remote;

use axum::response::Response;

pub use dispatcher::Dispatcher;
pub use remote::{RemoteError, RemoteFallback};

/// How a request was answered.
#[derive(Debug)]
pub enum DispatchOutcome {
    ServedLocal(Response),
    FellBackToRemote(Response),
    RemoteOnly(Response),
    NotFound,
    HandlerFault(String),
    RemoteUnavailable(String),
}

impl DispatchOutcome {
    /// Metric label.
    pub fn label(&self) -> &'static str {
        match self {
            DispatchOutcome::ServedLocal(_) => "served_local",
            DispatchOutcome::FellBackToRemote(_) => "fell_back_to_remote",
            DispatchOutcome::RemoteOnly(_) => "remote_only",
            DispatchOutcome::NotFound => "not_found",
            DispatchOutcome::HandlerFault(_) => "handler_fault",
            DispatchOutcome::RemoteUnavailable(_) => "remote_unavailable",
        }
    }
}
