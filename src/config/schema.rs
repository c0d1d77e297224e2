//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration for the local API gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Runtime mode reported by the status route (e.g. "standalone", "tauri-sidecar").
    pub mode: RuntimeMode,

    /// Listener configuration (host, port, conflict recovery).
    pub listener: ListenerConfig,

    /// Where handler descriptors are discovered.
    pub handlers: HandlerConfig,

    /// Remote fallback deployment.
    pub remote: RemoteConfig,

    /// Shared-token access control.
    pub access: AccessConfig,

    /// CORS settings applied by the response pipeline.
    pub cors: CorsConfig,

    /// Response compression settings.
    pub compression: CompressionConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Request and egress size limits.
    pub limits: LimitsConfig,

    /// SSRF guard settings for the feed route.
    pub ssrf: SsrfConfig,

    /// Traffic log settings.
    pub traffic: TrafficConfig,

    /// Secret probe settings.
    pub probe: ProbeConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// How the gateway was launched.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum RuntimeMode {
    #[default]
    Standalone,
    TauriSidecar,
    #[serde(untagged)]
    Other(String),
}

impl RuntimeMode {
    pub fn parse(value: &str) -> Self {
        match value.trim() {
            "standalone" => RuntimeMode::Standalone,
            "tauri-sidecar" => RuntimeMode::TauriSidecar,
            other => RuntimeMode::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            RuntimeMode::Standalone => "standalone",
            RuntimeMode::TauriSidecar => "tauri-sidecar",
            RuntimeMode::Other(s) => s,
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Host to bind (loopback by default; the gateway is desktop-local).
    pub host: String,

    /// Requested port.
    pub port: u16,

    /// Rebind to an OS-assigned port when the requested one is taken.
    pub recover_on_conflict: bool,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 46123,
            recover_on_conflict: true,
        }
    }
}

/// Handler discovery configuration.
///
/// `api_dir` wins over `resource_dir` when both are set.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HandlerConfig {
    /// Flat development layout: descriptors live directly under this directory.
    pub api_dir: Option<PathBuf>,

    /// Packaged layout: descriptors live under `<resource_dir>/_up_/api`.
    pub resource_dir: Option<PathBuf>,

    /// Path of the built-in SSRF-guarded feed route.
    pub feed_route: String,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            api_dir: None,
            resource_dir: None,
            feed_route: "/api/rss-proxy".to_string(),
        }
    }
}

/// Remote fallback configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Base origin of the hosted deployment.
    pub base_url: String,

    /// Enable remote fallback.
    pub fallback_enabled: bool,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: "https://worldmonitor.app".to_string(),
            fallback_enabled: true,
        }
    }
}

/// Access control configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AccessConfig {
    /// Shared bearer token. `None` disables authentication.
    pub token: Option<String>,
}

/// CORS configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Origins allowed to read responses. Empty means `*`.
    pub allowed_origins: Vec<String>,

    /// Preflight cache lifetime in seconds.
    pub max_age_secs: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: Vec::new(),
            max_age_secs: 86_400,
        }
    }
}

/// Response compression configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CompressionConfig {
    /// Enable response compression.
    pub enabled: bool,

    /// Bodies strictly larger than this many bytes are compressed.
    pub min_size: usize,

    /// Brotli quality (0-11).
    pub brotli_quality: u32,

    /// Gzip level (0-9).
    pub gzip_level: u32,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_size: 1024,
            brotli_quality: 5,
            gzip_level: 6,
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Whole-request timeout in seconds.
    pub request_secs: u64,

    /// Connection establishment timeout for outbound calls in seconds.
    pub connect_secs: u64,

    /// Handler egress (including feed fetch) timeout in seconds.
    pub egress_secs: u64,

    /// Remote fallback call timeout in seconds.
    pub fallback_secs: u64,

    /// Secret probe timeout in seconds.
    pub probe_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 60,
            connect_secs: 5,
            egress_secs: 20,
            fallback_secs: 30,
            probe_secs: 10,
        }
    }
}

/// Size limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum inbound request body in bytes.
    pub max_body_bytes: usize,

    /// Maximum feed response body in bytes.
    pub max_feed_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: 10 * 1024 * 1024,
            max_feed_bytes: 5 * 1024 * 1024,
        }
    }
}

/// SSRF guard configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SsrfConfig {
    /// Resolve hostnames and check every resolved address.
    pub resolve_dns: bool,

    /// Maximum redirects followed (each hop is re-validated).
    pub max_redirects: usize,
}

impl Default for SsrfConfig {
    fn default() -> Self {
        Self {
            resolve_dns: true,
            max_redirects: 5,
        }
    }
}

/// Traffic log configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TrafficConfig {
    /// Maximum retained entries.
    pub capacity: usize,
}

impl Default for TrafficConfig {
    fn default() -> Self {
        Self { capacity: 200 }
    }
}

/// Secret probe configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProbeConfig {
    /// Per-key probe URL overrides (key name → URL).
    pub endpoints: HashMap<String, String>,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON log lines instead of the human format.
    pub json_logs: bool,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9464".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_desktop_shell() {
        let config = GatewayConfig::default();
        assert_eq!(config.listener.port, 46123);
        assert_eq!(config.listener.host, "127.0.0.1");
        assert!(config.remote.fallback_enabled);
        assert!(config.access.token.is_none());
        assert_eq!(config.compression.min_size, 1024);
        assert_eq!(config.traffic.capacity, 200);
        assert_eq!(config.handlers.feed_route, "/api/rss-proxy");
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: GatewayConfig = toml::from_str(
            r#"
            mode = "tauri-sidecar"

            [listener]
            port = 5000

            [remote]
            fallback_enabled = false
            "#,
        )
        .unwrap();
        assert_eq!(config.mode, RuntimeMode::TauriSidecar);
        assert_eq!(config.listener.port, 5000);
        assert_eq!(config.listener.host, "127.0.0.1");
        assert!(!config.remote.fallback_enabled);
        assert_eq!(config.remote.base_url, "https://worldmonitor.app");
    }

    #[test]
    fn runtime_mode_parse() {
        assert_eq!(RuntimeMode::parse("tauri-sidecar"), RuntimeMode::TauriSidecar);
        assert_eq!(RuntimeMode::parse("dev").as_str(), "dev");
    }
}
