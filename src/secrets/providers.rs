//! Provider table for secret probes.

/// How a key is checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeKind {
    /// Local model server URL; probed for an OpenAI-compatible or native API.
    ModelEndpoint,
    /// Hosted API key checked against a provider endpoint.
    Hosted(HostedProvider),
    /// WebSocket relay URL; syntax only.
    RelayUrl,
    /// Accepted when non-empty.
    Unverified,
}

/// How the key is presented to the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyPlacement {
    Bearer,
    Query(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostedProvider {
    pub name: &'static str,
    pub url: &'static str,
    pub placement: KeyPlacement,
}

const GROQ: HostedProvider = HostedProvider {
    name: "Groq",
    url: "https://api.groq.com/openai/v1/models",
    placement: KeyPlacement::Bearer,
};

const OPENROUTER: HostedProvider = HostedProvider {
    name: "OpenRouter",
    url: "https://openrouter.ai/api/v1/auth/key",
    placement: KeyPlacement::Bearer,
};

const FRED: HostedProvider = HostedProvider {
    name: "FRED",
    url: "https://api.stlouisfed.org/fred/series?series_id=GDP&file_type=json",
    placement: KeyPlacement::Query("api_key"),
};

const EIA: HostedProvider = HostedProvider {
    name: "EIA",
    url: "https://api.eia.gov/v2/",
    placement: KeyPlacement::Query("api_key"),
};

const CLOUDFLARE: HostedProvider = HostedProvider {
    name: "Cloudflare",
    url: "https://api.cloudflare.com/client/v4/user/tokens/verify",
    placement: KeyPlacement::Bearer,
};

const ACLED: HostedProvider = HostedProvider {
    name: "ACLED",
    url: "https://acleddata.com/api/acled/read?limit=1",
    placement: KeyPlacement::Bearer,
};

pub fn probe_kind(key: &str) -> ProbeKind {
    match key {
        "OLLAMA_API_URL" => ProbeKind::ModelEndpoint,
        "GROQ_API_KEY" => ProbeKind::Hosted(GROQ),
        "OPENROUTER_API_KEY" => ProbeKind::Hosted(OPENROUTER),
        "FRED_API_KEY" => ProbeKind::Hosted(FRED),
        "EIA_API_KEY" => ProbeKind::Hosted(EIA),
        "CLOUDFLARE_API_TOKEN" => ProbeKind::Hosted(CLOUDFLARE),
        "ACLED_ACCESS_TOKEN" => ProbeKind::Hosted(ACLED),
        "WS_RELAY_URL" | "VITE_WS_RELAY_URL" | "VITE_OPENSKY_RELAY_URL" => ProbeKind::RelayUrl,
        _ => ProbeKind::Unverified,
    }
}
