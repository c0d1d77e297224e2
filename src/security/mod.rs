//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request
//!     → access_control.rs (shared token, status route exempt)
//!     → admin routes: key allowlist
//!     → feed route: ssrf.rs (scheme, credentials, private addresses, DNS)
//! ```
//!
//! # Design Decisions
//! - Token comparison is constant-time
//! - The status route is the only exemption and is fixed
//! - SSRF checks run on every redirect hop, not only the first URL

pub mod access_control;
pub mod ssrf;

pub use access_control::{is_allowlisted, AccessPolicy, ENV_ALLOWLIST, STATUS_ROUTE};
pub use ssrf::{SsrfGuard, SsrfViolation};
