//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Outbound call (handler egress, remote fallback, probe, feed fetch):
//!     → timeouts.rs (client with connect + request deadline)
//!     → On failure: FailureClass (timeout / connect / other)
//!     → caller maps the class to 502 / 504 or an invalid probe result
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - No retries: a failed local handler already gets one remote attempt

pub mod timeouts;

pub use timeouts::{EgressTimeouts, FailureClass};
