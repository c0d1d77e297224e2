//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! ListenerConfig (host, port)
//!     → listener.rs (bind; AddrInUse → port 0)
//!     → ServerBinding (requested vs actual port)
//!     → http::server (axum::serve) and the status route
//! ```
//!
//! # Design Decisions
//! - Loopback by default; the gateway serves one desktop client
//! - Port conflict is recoverable, any other bind failure is not

pub mod listener;

pub use listener::{Listener, ListenerError, ServerBinding};
