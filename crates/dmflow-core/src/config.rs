//! Connect flow configuration
//!
//! Defaults suit local development against the dashboard API. Production
//! hosts override them from the environment (`DMFLOW_*`) or construct the
//! config directly with the `with_*` builders.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::branding;
use crate::PopupFeatures;

/// Default interval between popup closure checks
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1_000;

/// Default time the user gets to finish authorizing in the popup
pub const DEFAULT_CALLBACK_TIMEOUT_SECS: u64 = 300;

/// Default per-request timeout for backend calls
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectConfig {
    /// Base URL of the dashboard API (e.g. https://api.example.com)
    pub api_base_url: String,
    /// Provider path segment (`/auth/{provider}/...`)
    pub provider: String,
    /// Only messages from this origin are inspected
    pub trusted_origin: String,
    pub poll_interval_ms: u64,
    /// `None` waits for the popup indefinitely
    pub callback_timeout_secs: Option<u64>,
    pub request_timeout_secs: u64,
    pub popup: PopupFeatures,
    /// Dashboard session token sent as a bearer token to the backend
    #[serde(skip_serializing)]
    pub session_token: Option<String>,
}

impl Default for ConnectConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8000".to_string(),
            provider: branding::DEFAULT_PROVIDER.to_string(),
            trusted_origin: "http://localhost:3000".to_string(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            callback_timeout_secs: Some(DEFAULT_CALLBACK_TIMEOUT_SECS),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            popup: PopupFeatures::default(),
            session_token: None,
        }
    }
}

impl ConnectConfig {
    pub fn new(api_base_url: impl Into<String>, trusted_origin: impl Into<String>) -> Self {
        Self {
            api_base_url: api_base_url.into(),
            trusted_origin: trusted_origin.into(),
            ..Self::default()
        }
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = provider.into();
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn with_callback_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.callback_timeout_secs = timeout.map(|t| t.as_secs());
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_secs = timeout.as_secs();
        self
    }

    pub fn with_session_token(mut self, token: impl Into<String>) -> Self {
        self.session_token = Some(token.into());
        self
    }

    pub fn with_popup(mut self, popup: PopupFeatures) -> Self {
        self.popup = popup;
        self
    }

    /// Load overrides from `DMFLOW_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`Self::from_env`] with an injectable variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{}_{}", branding::ENV_PREFIX, name));
        let mut config = Self::default();

        if let Some(url) = var("API_URL") {
            config.api_base_url = url;
        }
        if let Some(provider) = var("PROVIDER") {
            config.provider = provider;
        }
        if let Some(origin) = var("TRUSTED_ORIGIN") {
            config.trusted_origin = origin;
        }
        if let Some(token) = var("SESSION_TOKEN") {
            config.session_token = Some(token);
        }
        if let Some(ms) = var("POLL_INTERVAL_MS") {
            config.poll_interval_ms = ms
                .parse()
                .with_context(|| format!("Invalid POLL_INTERVAL_MS: {}", ms))?;
        }
        if let Some(secs) = var("CALLBACK_TIMEOUT_SECS") {
            // 0 disables the deadline
            let secs: u64 = secs
                .parse()
                .with_context(|| format!("Invalid CALLBACK_TIMEOUT_SECS: {}", secs))?;
            config.callback_timeout_secs = (secs > 0).then_some(secs);
        }

        config.validate()?;
        Ok(config)
    }

    /// Check URLs and intervals before the config is used
    pub fn validate(&self) -> Result<()> {
        let api = Url::parse(&self.api_base_url)
            .with_context(|| format!("Invalid API base URL: {}", self.api_base_url))?;
        if !matches!(api.scheme(), "http" | "https") {
            bail!("API base URL must be http(s): {}", self.api_base_url);
        }
        self.normalized_origin()?;
        if self.provider.is_empty() || self.provider.contains('/') {
            bail!("Invalid provider name: {:?}", self.provider);
        }
        if self.poll_interval_ms == 0 {
            bail!("Poll interval must be greater than zero");
        }
        Ok(())
    }

    /// Trusted origin in `scheme://host[:port]` form, as hosts report it
    pub fn normalized_origin(&self) -> Result<String> {
        let url = Url::parse(&self.trusted_origin)
            .with_context(|| format!("Invalid trusted origin: {}", self.trusted_origin))?;
        let origin = url.origin();
        if !origin.is_tuple() {
            bail!("Trusted origin has no host: {}", self.trusted_origin);
        }
        Ok(origin.ascii_serialization())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn callback_timeout(&self) -> Option<Duration> {
        self.callback_timeout_secs.map(Duration::from_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
