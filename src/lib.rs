//! Local API gateway library.

pub mod admin;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod handlers;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod resilience;
pub mod routing;
pub mod secrets;
pub mod security;

pub use config::schema::GatewayConfig;
pub use error::ApiError;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
