//! Terminal value of a connection attempt

use serde::Serialize;

use super::{AttemptId, ConnectError, ConnectStatus};

/// Outcome of one `connect()` call. Produced once per attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectionResult {
    pub attempt_id: AttemptId,
    pub connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_handle: Option<String>,
    /// User profile object as returned by the backend, passed through untouched
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ConnectError>,
}

impl ConnectionResult {
    pub fn connected(
        attempt_id: AttemptId,
        account_handle: Option<String>,
        user: Option<serde_json::Value>,
    ) -> Self {
        Self {
            attempt_id,
            connected: true,
            account_handle,
            user,
            error: None,
        }
    }

    pub fn failed(attempt_id: AttemptId, error: ConnectError) -> Self {
        Self {
            attempt_id,
            connected: false,
            account_handle: None,
            user: None,
            error: Some(error),
        }
    }

    /// Terminal status corresponding to this result
    pub fn status(&self) -> ConnectStatus {
        match &self.error {
            None => ConnectStatus::Connected,
            Some(error) => error.clone().into(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.error == Some(ConnectError::Cancelled)
    }

    /// Message for the UI; `None` on success
    pub fn user_message(&self) -> Option<&'static str> {
        self.error.as_ref().map(ConnectError::user_message)
    }
}
