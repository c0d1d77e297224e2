//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     api dir (*.toml descriptors) + code-registered handlers
//!     → registry.rs (walk, derive patterns, build via catalog)
//!     → router.rs (sort by specificity, freeze as RouteTable)
//!
//! Per request:
//!     path → router.rs (first match wins)
//!          → matcher.rs (segment compare, capture [params])
//!          → RouteMatch or None
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - No regex in hot path (segment comparison only)
//! - Deterministic: literal segments beat dynamic ones

pub mod matcher;
pub mod registry;
pub mod router;

pub use matcher::{has_dot_segment, is_dot_segment, PatternError, RoutePattern};
pub use registry::{HandlerSource, LoadError, LoadFailure, Registry};
pub use router::{Route, RouteMatch, RouteTable};
