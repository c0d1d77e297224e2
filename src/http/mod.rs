//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware stack)
//!     → pipeline.rs (preflight; later CORS, Vary, compression)
//!     → request.rs (buffer body once → InboundRequest)
//!     → [dispatch decides local vs remote]
//!     → response.rs (outcome → response, hop-by-hop stripping)
//!     → compression.rs (br / gzip when negotiated)
//!     → Send to client
//! ```

pub mod compression;
pub mod pipeline;
pub mod request;
pub mod response;
pub mod server;

pub use request::InboundRequest;
pub use server::{AppState, HttpServer, ServerError};
