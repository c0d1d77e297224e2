//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters, histograms)
//!     → traffic.rs (in-memory request log for the desktop UI)
//!
//! Consumers:
//!     → stdout (fmt or JSON lines)
//!     → Prometheus scrape endpoint (optional)
//!     → GET /api/local-traffic-log
//! ```
//!
//! # Design Decisions
//! - Request ID flows through spans and response headers
//! - Query strings never reach logs, spans, metrics or the traffic log
//! - Metrics are cheap (atomic increments); recording with no exporter is a no-op

pub mod logging;
pub mod metrics;
pub mod traffic;

pub use traffic::{TrafficLog, TrafficLogEntry};
