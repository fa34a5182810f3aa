//! Code Exchanger - backend contract for the connect flow
//!
//! Two endpoints on the dashboard API:
//!
//! - `GET  /auth/{provider}/login`    -> `{ auth_url, state }`
//! - `POST /auth/{provider}/callback` `{ code, state }` -> `{ connected, account_handle?, user? }`
//!
//! No retries happen here; the orchestrator (or the user) decides whether a
//! failed attempt is worth starting again.

use anyhow::{Context, Result};
use async_trait::async_trait;
use dmflow_core::{ConnectConfig, ConnectError, StateToken};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::Url;

/// Longest slice of an unparseable error body kept in error messages
const MAX_ERROR_BODY_CHARS: usize = 200;

/// Authorization URL issued by the backend for one attempt
#[derive(Debug, Clone, PartialEq)]
pub struct AuthUrlGrant {
    pub auth_url: Url,
    /// State embedded in `auth_url` by the backend, if it issued one
    pub state: Option<String>,
}

/// Successful code exchange
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExchangeOutcome {
    pub account_handle: Option<String>,
    pub user: Option<serde_json::Value>,
}

/// Backend operations used by the orchestrator
#[async_trait]
pub trait ConnectBackend: Send + Sync {
    /// Fetch the authorization URL for a new attempt
    async fn login(&self) -> Result<AuthUrlGrant, ConnectError>;

    /// Trade a one-time authorization code for a durable connection
    async fn exchange_code(
        &self,
        code: &str,
        state: &StateToken,
    ) -> Result<ExchangeOutcome, ConnectError>;
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    auth_url: String,
    #[serde(default)]
    state: Option<String>,
}

#[derive(Serialize)]
struct CallbackRequest<'a> {
    code: &'a str,
    state: &'a str,
}

#[derive(Debug, Deserialize)]
struct CallbackResponse {
    connected: bool,
    #[serde(default)]
    account_handle: Option<String>,
    #[serde(default)]
    user: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(alias = "detail", alias = "message")]
    error: String,
}

/// `ConnectBackend` over HTTP/JSON
pub struct HttpConnectBackend {
    http: reqwest::Client,
    login_url: Url,
    callback_url: Url,
    session_token: Option<String>,
}

impl HttpConnectBackend {
    /// Build a backend client with the configured request timeout
    pub fn new(config: &ConnectConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .context("Failed to build HTTP client")?;
        Self::with_client(http, config)
    }

    /// Build a backend client around an existing `reqwest::Client`
    pub fn with_client(http: reqwest::Client, config: &ConnectConfig) -> Result<Self> {
        let login_url = endpoint_url(config, "login")?;
        let callback_url = endpoint_url(config, "callback")?;

        Ok(Self {
            http,
            login_url,
            callback_url,
            session_token: config.session_token.clone(),
        })
    }

    pub fn login_url(&self) -> &Url {
        &self.login_url
    }

    pub fn callback_url(&self) -> &Url {
        &self.callback_url
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.session_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

/// `{api_base_url}/auth/{provider}/{action}`, with the provider percent-encoded
/// as a single path segment
fn endpoint_url(config: &ConnectConfig, action: &str) -> Result<Url> {
    let mut url = Url::parse(&config.api_base_url)
        .with_context(|| format!("Invalid API base URL: {}", config.api_base_url))?;
    url.path_segments_mut()
        .map_err(|_| anyhow::anyhow!("API base URL cannot have a path: {}", config.api_base_url))?
        .pop_if_empty()
        .extend(["auth", config.provider.as_str(), action]);
    Ok(url)
}

#[async_trait]
impl ConnectBackend for HttpConnectBackend {
    async fn login(&self) -> Result<AuthUrlGrant, ConnectError> {
        debug!("[OAuth] Requesting authorization URL from {}", self.login_url);

        let response = self
            .authorize(self.http.get(self.login_url.clone()))
            .send()
            .await
            .map_err(transport_error)?;
        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;

        if !status.is_success() {
            warn!("[OAuth] Login endpoint returned HTTP {}", status);
            return Err(status_error(status, &body, |message| {
                ConnectError::Protocol(format!("login endpoint returned HTTP {}: {}", status, message))
            }));
        }

        let login: LoginResponse = serde_json::from_str(&body)
            .map_err(|e| ConnectError::Protocol(format!("invalid login response: {}", e)))?;
        let auth_url = Url::parse(&login.auth_url).map_err(|e| {
            ConnectError::Protocol(format!("invalid auth_url {:?}: {}", login.auth_url, e))
        })?;

        Ok(AuthUrlGrant {
            auth_url,
            state: login.state.filter(|s| !s.is_empty()),
        })
    }

    async fn exchange_code(
        &self,
        code: &str,
        state: &StateToken,
    ) -> Result<ExchangeOutcome, ConnectError> {
        info!(
            "[OAuth] Exchanging authorization code (length {}) for state={}",
            code.len(),
            state.short()
        );

        let response = self
            .authorize(self.http.post(self.callback_url.clone()))
            .json(&CallbackRequest {
                code,
                state: state.as_str(),
            })
            .send()
            .await
            .map_err(transport_error)?;
        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;

        if !status.is_success() {
            warn!("[OAuth] Code exchange returned HTTP {}", status);
            return Err(status_error(status, &body, ConnectError::ExchangeRejected));
        }

        let parsed: CallbackResponse = serde_json::from_str(&body)
            .map_err(|e| ConnectError::Protocol(format!("invalid callback response: {}", e)))?;

        if !parsed.connected {
            let reason = parsed
                .error
                .unwrap_or_else(|| "backend reported the account as not connected".to_string());
            return Err(ConnectError::ExchangeRejected(reason));
        }

        let account_handle = parsed.account_handle.or_else(|| {
            parsed
                .user
                .as_ref()
                .and_then(|u| u.get("username"))
                .and_then(|v| v.as_str())
                .map(str::to_string)
        });

        info!(
            "[OAuth] Code exchange successful (account={})",
            account_handle.as_deref().unwrap_or("<unknown>")
        );

        Ok(ExchangeOutcome {
            account_handle,
            user: parsed.user,
        })
    }
}

/// Map a failed request (no usable HTTP response) to an error
fn transport_error(e: reqwest::Error) -> ConnectError {
    if e.is_decode() {
        ConnectError::Protocol(e.to_string())
    } else {
        ConnectError::Network(e.to_string())
    }
}

/// Map a non-2xx status. `client_error` builds the error for 4xx statuses
/// other than 401 and rate limiting; a 403 is the backend refusing the
/// request itself, not the session.
fn status_error<F>(status: StatusCode, body: &str, client_error: F) -> ConnectError
where
    F: FnOnce(String) -> ConnectError,
{
    let message = error_message(status, body);
    match status {
        StatusCode::UNAUTHORIZED => ConnectError::SessionExpired,
        StatusCode::TOO_MANY_REQUESTS => ConnectError::Network(format!("HTTP {}: {}", status, message)),
        s if s.is_server_error() => ConnectError::Network(format!("HTTP {}: {}", status, message)),
        _ => client_error(message),
    }
}

fn error_message(status: StatusCode, body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
        return parsed.error;
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return status
            .canonical_reason()
            .unwrap_or("unknown error")
            .to_string();
    }
    trimmed.chars().take(MAX_ERROR_BODY_CHARS).collect()
}
