//! Connection attempt entity and status values

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{ConnectError, StateToken};

/// Identifier of one `connect()` invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttemptId(Uuid);

impl AttemptId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for AttemptId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Connection status as seen by the UI
///
/// `Idle` belongs to the orchestrator only; an attempt starts in `Pending`
/// and ends in one of the terminal statuses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "status", content = "error", rename_all = "snake_case")]
pub enum ConnectStatus {
    /// No attempt in flight
    #[default]
    Idle,
    /// Attempt created, state token generated
    Pending,
    /// Authorization window is being opened
    AwaitingPopup,
    /// Window is showing the provider; waiting for message or closure
    AwaitingCallback,
    /// Trading the authorization code with the backend
    Exchanging,
    /// Account connected
    Connected,
    /// Attempt failed
    Failed(ConnectError),
    /// Attempt abandoned by the user or superseded
    Cancelled,
}

impl ConnectStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ConnectStatus::Connected | ConnectStatus::Failed(_) | ConnectStatus::Cancelled
        )
    }

    /// Whether an attempt is in flight in this status
    pub fn is_active(&self) -> bool {
        !self.is_terminal() && *self != ConnectStatus::Idle
    }

    pub fn label(&self) -> &'static str {
        match self {
            ConnectStatus::Idle => "idle",
            ConnectStatus::Pending => "pending",
            ConnectStatus::AwaitingPopup => "awaiting_popup",
            ConnectStatus::AwaitingCallback => "awaiting_callback",
            ConnectStatus::Exchanging => "exchanging",
            ConnectStatus::Connected => "connected",
            ConnectStatus::Failed(_) => "failed",
            ConnectStatus::Cancelled => "cancelled",
        }
    }
}

impl From<ConnectError> for ConnectStatus {
    fn from(error: ConnectError) -> Self {
        match error {
            ConnectError::Cancelled => ConnectStatus::Cancelled,
            other => ConnectStatus::Failed(other),
        }
    }
}

/// One live connection attempt.
///
/// Owned by the orchestrator's current-attempt slot; callers only ever see
/// cloned snapshots.
#[derive(Debug, Clone)]
pub struct ConnectionAttempt {
    pub id: AttemptId,
    pub state_token: StateToken,
    pub created_at: DateTime<Utc>,
    pub status: ConnectStatus,
}

impl ConnectionAttempt {
    /// Create a new attempt in `Pending`
    pub fn new(state_token: StateToken) -> Self {
        Self {
            id: AttemptId::new(),
            state_token,
            created_at: Utc::now(),
            status: ConnectStatus::Pending,
        }
    }

    /// Time since the attempt was created
    pub fn age(&self) -> chrono::Duration {
        Utc::now() - self.created_at
    }
}
