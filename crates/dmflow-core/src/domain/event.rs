//! Status events - one per orchestrator state transition
//!
//! Consumed by the UI layer (spinners, badges) through the event bus.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AttemptId, ConnectStatus};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusEvent {
    /// Attempt that transitioned; `None` for the return to `Idle`
    pub attempt_id: Option<AttemptId>,
    pub status: ConnectStatus,
    pub at: DateTime<Utc>,
}

impl StatusEvent {
    pub fn new(attempt_id: Option<AttemptId>, status: ConnectStatus) -> Self {
        Self {
            attempt_id,
            status,
            at: Utc::now(),
        }
    }

    pub fn idle() -> Self {
        Self::new(None, ConnectStatus::Idle)
    }

    /// Event type name for logging
    pub fn type_name(&self) -> &'static str {
        self.status.label()
    }
}
