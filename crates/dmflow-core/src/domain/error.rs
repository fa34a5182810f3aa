//! Connect error taxonomy
//!
//! Every way a connection attempt can end without `Connected`. Each variant
//! maps to its own user-facing message because the required user action
//! differs (enable popups, re-authorize, sign in again, retry later).

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Terminal failure of a connection attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum ConnectError {
    /// The host refused to create the authorization window
    #[error("authorization popup was blocked")]
    PopupBlocked,

    /// The callback's state does not belong to the live attempt
    #[error("callback state does not match the live connection attempt")]
    StateMismatch,

    /// The user (or the platform) declined authorization upstream
    #[error("authorization denied by provider: {reason}")]
    ExternalDenied { reason: String },

    /// The attempt was abandoned, superseded, or explicitly cancelled
    #[error("connection attempt cancelled")]
    Cancelled,

    /// No callback arrived before the configured deadline
    #[error("no authorization callback within {after_secs}s")]
    TimedOut { after_secs: u64 },

    /// Transport failure talking to the backend (retryable)
    #[error("network error: {0}")]
    Network(String),

    /// Backend refused the code/state pair; the attempt is dead
    #[error("backend rejected authorization code: {0}")]
    ExchangeRejected(String),

    /// Backend answered with a shape we do not understand
    #[error("malformed backend response: {0}")]
    Protocol(String),

    /// Backend refused the dashboard session itself (HTTP 401)
    #[error("dashboard session expired")]
    SessionExpired,
}

impl ConnectError {
    /// Message shown to the merchant for this failure
    pub fn user_message(&self) -> &'static str {
        match self {
            ConnectError::PopupBlocked => {
                "Your browser blocked the Instagram window. Allow popups for this site and try again."
            }
            ConnectError::StateMismatch => {
                "We couldn't verify the response from Instagram, so the connection was stopped for your security. Please start again."
            }
            ConnectError::ExternalDenied { .. } => {
                "Instagram access was not granted. Approve the requested permissions to connect your account."
            }
            ConnectError::Cancelled => "The Instagram window was closed before the connection finished.",
            ConnectError::TimedOut { .. } => {
                "The Instagram window took too long to respond. Please try connecting again."
            }
            ConnectError::Network(_) => {
                "We couldn't reach our servers. Check your connection and try again."
            }
            ConnectError::ExchangeRejected(_) => {
                "Instagram's authorization expired or was already used. Please connect again."
            }
            ConnectError::Protocol(_) => {
                "We received an unexpected response while connecting. Please try again later."
            }
            ConnectError::SessionExpired => "Your dashboard session has expired. Sign in again to continue.",
        }
    }

    /// Whether simply calling `connect()` again is a sensible next step
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ConnectError::Network(_)
                | ConnectError::TimedOut { .. }
                | ConnectError::Cancelled
                | ConnectError::PopupBlocked
        )
    }

    /// Failures that indicate a forged or replayed callback
    pub fn is_security_event(&self) -> bool {
        matches!(self, ConnectError::StateMismatch)
    }

    /// Stable machine-readable kind
    pub fn kind(&self) -> &'static str {
        match self {
            ConnectError::PopupBlocked => "popup_blocked",
            ConnectError::StateMismatch => "state_mismatch",
            ConnectError::ExternalDenied { .. } => "external_denied",
            ConnectError::Cancelled => "cancelled",
            ConnectError::TimedOut { .. } => "timed_out",
            ConnectError::Network(_) => "network",
            ConnectError::ExchangeRejected(_) => "exchange_rejected",
            ConnectError::Protocol(_) => "protocol",
            ConnectError::SessionExpired => "session_expired",
        }
    }
}
