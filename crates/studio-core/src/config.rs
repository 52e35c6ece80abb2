use std::time::Duration;

use tracing::debug;

use crate::error::CoreError;

/// Connection settings for the studio API and the workflow gateway.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StudioConfig {
    /// Base URL of the studio REST API (agents, workflows, knowledge bases).
    pub api_base_url: String,
    /// Bearer token for the studio REST API.
    pub api_token: Option<String>,
    /// Base URL of the workflow gateway. Defaults to `api_base_url`.
    pub gateway_base_url: String,
    /// Application token forwarded to the workflow gateway.
    pub gateway_token: Option<String>,
    /// Timeout for plain request/response calls.
    pub request_timeout: Duration,
    /// Timeout for a whole streamed workflow run.
    pub stream_timeout: Duration,
}

impl StudioConfig {
    /// Creates a config pointing both the API and the gateway at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            gateway_base_url: base_url.clone(),
            api_base_url: base_url,
            api_token: None,
            gateway_token: None,
            request_timeout: Duration::from_secs(30),
            stream_timeout: Duration::from_secs(120),
        }
    }

    /// Loads `.env` (if present) and builds the config from `STUDIO_*` variables.
    pub fn from_env() -> Result<Self, CoreError> {
        load_dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, CoreError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_base_url = get("STUDIO_API_BASE_URL")
            .ok_or_else(|| CoreError::config("missing STUDIO_API_BASE_URL"))?;
        let mut config = Self::new(api_base_url.trim());
        if let Some(gateway) = get("STUDIO_GATEWAY_BASE_URL") {
            config.gateway_base_url = gateway.trim().to_string();
        }
        config.api_token = get("STUDIO_API_TOKEN");
        config.gateway_token = get("STUDIO_GATEWAY_TOKEN");
        if let Some(raw) = get("STUDIO_REQUEST_TIMEOUT_SECS") {
            config.request_timeout = parse_secs("STUDIO_REQUEST_TIMEOUT_SECS", &raw)?;
        }
        if let Some(raw) = get("STUDIO_STREAM_TIMEOUT_SECS") {
            config.stream_timeout = parse_secs("STUDIO_STREAM_TIMEOUT_SECS", &raw)?;
        }
        debug!(
            event = "config.loaded",
            api_base_url = %config.api_base_url,
            gateway_base_url = %config.gateway_base_url,
            api_token = config.api_token.is_some(),
            gateway_token = config.gateway_token.is_some(),
            "studio config resolved"
        );
        Ok(config)
    }

    /// Overrides the studio API token.
    pub fn api_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(token.into());
        self
    }

    /// Overrides the gateway base URL.
    pub fn gateway_base_url(mut self, url: impl Into<String>) -> Self {
        self.gateway_base_url = url.into();
        self
    }

    /// Overrides the gateway token.
    pub fn gateway_token(mut self, token: impl Into<String>) -> Self {
        self.gateway_token = Some(token.into());
        self
    }

    /// Overrides the request timeout.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Overrides the streaming timeout.
    pub fn stream_timeout(mut self, timeout: Duration) -> Self {
        self.stream_timeout = timeout;
        self
    }
}

/// Loads `.env` from the crate directory, then from the working directory.
pub fn load_dotenv() {
    let _ = dotenvy::from_path(std::path::Path::new(
        format!("{}/.env", env!("CARGO_MANIFEST_DIR")).as_str(),
    ));
    dotenvy::dotenv().ok();
}

fn parse_secs(key: &str, raw: &str) -> Result<Duration, CoreError> {
    match raw.trim().parse::<u64>() {
        Ok(0) | Err(_) => Err(CoreError::config(format!(
            "{key} must be a positive number of seconds, got {raw:?}"
        ))),
        Ok(secs) => Ok(Duration::from_secs(secs)),
    }
}
