//! Cross-window messages
//!
//! The authorization popup reports its outcome by posting a message to the
//! window that opened it. Wire shapes:
//!
//! ```text
//! { "type": "OAUTH_SUCCESS", "code": "...", "state": "..." }
//! { "type": "OAUTH_ERROR", "error": "..." }
//! ```

use serde::{Deserialize, Serialize};

/// A message as delivered by the host, before any validation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowMessage {
    /// Origin of the posting window (`scheme://host[:port]`)
    pub origin: String,
    /// Arbitrary payload
    pub data: serde_json::Value,
}

impl WindowMessage {
    pub fn new(origin: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            origin: origin.into(),
            data,
        }
    }
}

/// Recognized popup outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum OAuthMessage {
    #[serde(rename = "OAUTH_SUCCESS")]
    Success { code: String, state: String },

    #[serde(rename = "OAUTH_ERROR")]
    Error {
        error: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error_description: Option<String>,
    },
}

impl OAuthMessage {
    /// Decode a payload; `None` for anything that is not a recognized shape
    pub fn decode(data: &serde_json::Value) -> Option<Self> {
        serde_json::from_value(data.clone()).ok()
    }

    pub fn success(code: impl Into<String>, state: impl Into<String>) -> Self {
        OAuthMessage::Success {
            code: code.into(),
            state: state.into(),
        }
    }

    pub fn error(error: impl Into<String>) -> Self {
        OAuthMessage::Error {
            error: error.into(),
            error_description: None,
        }
    }

    /// Error text including the description when present
    pub fn error_message(&self) -> Option<String> {
        match self {
            OAuthMessage::Success { .. } => None,
            OAuthMessage::Error {
                error,
                error_description,
            } => Some(match error_description {
                Some(desc) => format!("{}: {}", error, desc),
                None => error.clone(),
            }),
        }
    }

    /// Payload as posted by the popup
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}
