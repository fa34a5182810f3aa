//! Event Bus - status event distribution
//!
//! Every orchestrator state transition is published here so the UI layer
//! can bind to it without touching the orchestrator's state.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │              Event Bus (broadcast channel)               │
//! │                                                          │
//! │  Producer:                     Consumers:                │
//! │  └─ ConnectionOrchestrator     ├─ on_status_change(cb)   │
//! │                                ├─ Connect button spinner │
//! │                                └─ Account badge          │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! let bus = EventBus::new();
//! let sender = bus.sender();
//! let mut receiver = bus.subscribe();
//!
//! sender.emit(StatusEvent::idle());
//! while let Some(event) = receiver.recv().await { ... }
//! ```

use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::StatusEvent;

/// Default channel capacity for the event bus
const DEFAULT_CAPACITY: usize = 64;

/// Event Bus - hub for status event distribution
///
/// Uses a broadcast channel so each consumer receives its own copy of
/// every event emitted after it subscribed.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<StatusEvent>,
}

impl EventBus {
    /// Create a new event bus with default capacity
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a new event bus with custom capacity
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Get a sender for emitting events
    pub fn sender(&self) -> EventSender {
        EventSender::new(self.sender.clone())
    }

    /// Subscribe to receive events
    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver::new(self.sender.subscribe())
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Event Sender - cheaply cloneable emitting half
#[derive(Clone)]
pub struct EventSender {
    sender: broadcast::Sender<StatusEvent>,
}

impl EventSender {
    fn new(sender: broadcast::Sender<StatusEvent>) -> Self {
        Self { sender }
    }

    /// Emit a status event
    ///
    /// Returns the number of receivers that received the event.
    /// Returns 0 if there are no subscribers (not an error).
    pub fn emit(&self, event: StatusEvent) -> usize {
        let type_name = event.type_name();
        match self.sender.send(event) {
            Ok(count) => {
                debug!(
                    event_type = type_name,
                    receivers = count,
                    "[EventBus] Emitted status event"
                );
                count
            }
            Err(_) => {
                debug!(event_type = type_name, "[EventBus] No receivers for event");
                0
            }
        }
    }

    /// Check if there are any subscribers
    pub fn has_subscribers(&self) -> bool {
        self.sender.receiver_count() > 0
    }
}

/// Event Receiver - used by consumers to receive status events
pub struct EventReceiver {
    receiver: broadcast::Receiver<StatusEvent>,
}

impl EventReceiver {
    fn new(receiver: broadcast::Receiver<StatusEvent>) -> Self {
        Self { receiver }
    }

    /// Receive the next event
    ///
    /// Returns `None` if the channel is closed. Lag is logged and skipped.
    pub async fn recv(&mut self) -> Option<StatusEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(
                        skipped_events = skipped,
                        "[EventBus] Receiver lagged, skipped {} events", skipped
                    );
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("[EventBus] Channel closed");
                    return None;
                }
            }
        }
    }

    /// Try to receive an event without blocking
    pub fn try_recv(&mut self) -> Option<StatusEvent> {
        match self.receiver.try_recv() {
            Ok(event) => Some(event),
            Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                warn!(skipped_events = skipped, "[EventBus] Receiver lagged on try_recv");
                self.receiver.try_recv().ok()
            }
            Err(_) => None,
        }
    }
}
