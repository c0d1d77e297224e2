//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → loader.rs (LOCAL_API_* environment overrides)
//!     → main.rs (command-line overrides)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → shared by value / Arc with all subsystems
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; there is no hot reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{apply_env_overrides, load_config, read_config, ConfigError};
pub use schema::{
    AccessConfig, CompressionConfig, CorsConfig, GatewayConfig, HandlerConfig, LimitsConfig,
    ListenerConfig, ObservabilityConfig, ProbeConfig, RemoteConfig, RuntimeMode, SsrfConfig,
    TimeoutConfig, TrafficConfig,
};
pub use validation::{validate_config, ValidationError};
