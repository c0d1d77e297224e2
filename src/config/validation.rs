//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, compression levels)
//! - Check URLs and route paths are well-formed
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use url::Url;

use crate::config::schema::GatewayConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Validate a configuration, collecting every error.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.host.parse::<std::net::IpAddr>().is_err() {
        errors.push(ValidationError::new("listener.host", "must be an IP address"));
    }

    if config.remote.fallback_enabled {
        match Url::parse(&config.remote.base_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => {}
            Ok(_) => errors.push(ValidationError::new(
                "remote.base_url",
                "must be an http(s) URL with a host",
            )),
            Err(e) => errors.push(ValidationError::new("remote.base_url", e.to_string())),
        }
    }

    let feed = &config.handlers.feed_route;
    if !feed.starts_with("/api/") || feed.contains('?') {
        errors.push(ValidationError::new(
            "handlers.feed_route",
            "must be a path under /api/",
        ));
    }

    if let Some(token) = &config.access.token {
        if token.chars().any(char::is_whitespace) {
            errors.push(ValidationError::new(
                "access.token",
                "must not contain whitespace",
            ));
        }
    }

    let timeouts = &config.timeouts;
    for (field, value) in [
        ("timeouts.request_secs", timeouts.request_secs),
        ("timeouts.connect_secs", timeouts.connect_secs),
        ("timeouts.egress_secs", timeouts.egress_secs),
        ("timeouts.fallback_secs", timeouts.fallback_secs),
        ("timeouts.probe_secs", timeouts.probe_secs),
    ] {
        if value == 0 {
            errors.push(ValidationError::new(field, "must be greater than zero"));
        }
    }

    if config.limits.max_body_bytes == 0 {
        errors.push(ValidationError::new("limits.max_body_bytes", "must be greater than zero"));
    }
    if config.limits.max_feed_bytes == 0 {
        errors.push(ValidationError::new("limits.max_feed_bytes", "must be greater than zero"));
    }
    if config.traffic.capacity == 0 {
        errors.push(ValidationError::new("traffic.capacity", "must be greater than zero"));
    }

    if config.compression.brotli_quality > 11 {
        errors.push(ValidationError::new(
            "compression.brotli_quality",
            format!("{} (must be 0-11)", config.compression.brotli_quality),
        ));
    }
    if config.compression.gzip_level > 9 {
        errors.push(ValidationError::new(
            "compression.gzip_level",
            format!("{} (must be 0-9)", config.compression.gzip_level),
        ));
    }

    for (key, endpoint) in &config.probe.endpoints {
        if Url::parse(endpoint).is_err() {
            errors.push(ValidationError::new(
                "probe.endpoints",
                format!("{key} has an invalid URL"),
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&GatewayConfig::default()).is_ok());
    }

    #[test]
    fn collects_every_error() {
        let mut config = GatewayConfig::default();
        config.remote.base_url = "not a url".into();
        config.timeouts.egress_secs = 0;
        config.compression.brotli_quality = 12;
        config.handlers.feed_route = "/rss".into();

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec![
                "remote.base_url",
                "handlers.feed_route",
                "timeouts.egress_secs",
                "compression.brotli_quality",
            ]
        );
    }

    #[test]
    fn remote_base_ignored_when_fallback_disabled() {
        let mut config = GatewayConfig::default();
        config.remote.fallback_enabled = false;
        config.remote.base_url = String::new();
        assert!(validate_config(&config).is_ok());
    }
}
