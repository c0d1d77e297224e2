//! Runtime secrets: the environment store and live key validation.
//!
//! # Data Flow
//! ```text
//! process env (allowlisted keys, once at startup)
//!     → store.rs (EnvStore, shared by clone)
//!     ↔ admin routes (env update, validate-secret)
//!     → handlers (HandlerContext::env)
//!
//! validate-secret:
//!     key → providers.rs (probe kind) → probe.rs (live check) → ProbeResult
//!     → valid? EnvStore::set
//! ```

pub mod probe;
pub mod providers;
pub mod store;

pub use probe::{ProbeError, ProbeResult, SecretProbe};
pub use store::EnvStore;
