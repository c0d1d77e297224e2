//! Timeout enforcement for outbound calls.
//!
//! # Responsibilities
//! - Build egress clients with connect and request deadlines
//! - Classify transport failures (timeout / connect / other)
//!
//! # Design Decisions
//! - Every outbound call has a finite deadline
//! - Failure classes never carry URLs, so they are safe to log and return
//! - Redirects are disabled on guarded clients; callers re-validate each hop

use std::time::Duration;

use crate::config::TimeoutConfig;

/// Deadlines for the different kinds of egress.
#[derive(Debug, Clone, Copy)]
pub struct EgressTimeouts {
    pub connect: Duration,
    pub egress: Duration,
    pub fallback: Duration,
    pub probe: Duration,
}

impl From<&TimeoutConfig> for EgressTimeouts {
    fn from(config: &TimeoutConfig) -> Self {
        Self {
            connect: Duration::from_secs(config.connect_secs),
            egress: Duration::from_secs(config.egress_secs),
            fallback: Duration::from_secs(config.fallback_secs),
            probe: Duration::from_secs(config.probe_secs),
        }
    }
}

impl Default for EgressTimeouts {
    fn default() -> Self {
        Self::from(&TimeoutConfig::default())
    }
}

impl EgressTimeouts {
    /// System proxy variables are ignored.
    fn base(&self, timeout: Duration) -> reqwest::ClientBuilder {
        reqwest::Client::builder()
            .no_proxy()
            .connect_timeout(self.connect)
            .timeout(timeout)
            .user_agent(concat!("local-api-gateway/", env!("CARGO_PKG_VERSION")))
    }

    /// Client for handler egress.
    pub fn egress_client(&self) -> reqwest::Result<reqwest::Client> {
        self.base(self.egress).build()
    }

    /// Client for the remote fallback. Redirects are passed through to the caller.
    pub fn fallback_client(&self) -> reqwest::Result<reqwest::Client> {
        self.base(self.fallback)
            .redirect(reqwest::redirect::Policy::none())
            .build()
    }

    /// Client for secret probes.
    pub fn probe_client(&self) -> reqwest::Result<reqwest::Client> {
        self.base(self.probe).build()
    }

    /// Builder for SSRF-guarded fetches; the caller pins DNS and follows redirects.
    pub fn guarded_builder(&self) -> reqwest::ClientBuilder {
        self.base(self.egress)
            .redirect(reqwest::redirect::Policy::none())
    }
}

/// Coarse transport failure class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    Timeout,
    Connect,
    Other,
}

impl FailureClass {
    pub fn of(error: &reqwest::Error) -> Self {
        if error.is_timeout() {
            FailureClass::Timeout
        } else if error.is_connect() {
            FailureClass::Connect
        } else {
            FailureClass::Other
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FailureClass::Timeout => "timeout",
            FailureClass::Connect => "connect",
            FailureClass::Other => "other",
        }
    }
}
