//! Completion Listener - cross-window message channel
//!
//! The host delivers every message posted to the opener window into a
//! [`MessageChannel`]. A [`CompletionListener`] subscribes once per attempt,
//! filters by origin and payload shape, and hands the first recognized
//! [`OAuthMessage`] to the orchestrator. It does not look at the state: it is
//! transport, not authorization.
//!
//! Each subscription is an entry in the channel's registry. Removing the
//! entry (through a [`ListenerRegistration`], or by dropping the listener)
//! takes effect immediately, even while the listener's future is parked and
//! never polled again. A released attempt cannot receive a message meant for
//! a later one.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use dmflow_core::{OAuthMessage, WindowMessage};
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

/// Default per-listener queue; messages are rare and consumed immediately
const DEFAULT_CAPACITY: usize = 32;

/// The subscription was released before a recognized message arrived
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("message channel closed before completion")]
pub struct ListenerClosed;

struct Registry {
    capacity: usize,
    next_id: AtomicU64,
    listeners: Mutex<HashMap<u64, mpsc::Sender<WindowMessage>>>,
}

impl Registry {
    fn remove(&self, id: u64) -> bool {
        self.listeners.lock().remove(&id).is_some()
    }
}

/// Host-side message channel (the `message` event of the opener window)
#[derive(Clone)]
pub struct MessageChannel {
    registry: Arc<Registry>,
}

impl MessageChannel {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            registry: Arc::new(Registry {
                capacity: capacity.max(1),
                next_id: AtomicU64::new(1),
                listeners: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Deliver a message to every current listener.
    ///
    /// Returns how many listeners received it (0 is not an error).
    pub fn post(&self, message: WindowMessage) -> usize {
        let mut listeners = self.registry.listeners.lock();
        let mut delivered = 0;
        listeners.retain(|id, sender| match sender.try_send(message.clone()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("[OAuth] Listener {} queue full, dropping message", id);
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        });
        delivered
    }

    /// Number of live subscriptions
    pub fn listener_count(&self) -> usize {
        self.registry.listeners.lock().len()
    }

    fn register(&self) -> (ListenerRegistration, mpsc::Receiver<WindowMessage>) {
        let (sender, receiver) = mpsc::channel(self.registry.capacity);
        let id = self.registry.next_id.fetch_add(1, Ordering::Relaxed);
        self.registry.listeners.lock().insert(id, sender);
        let registration = ListenerRegistration {
            id,
            registry: Arc::downgrade(&self.registry),
        };
        (registration, receiver)
    }
}

impl Default for MessageChannel {
    fn default() -> Self {
        Self::new()
    }
}

/// Detachable handle to one listener's subscription
#[derive(Clone)]
pub struct ListenerRegistration {
    id: u64,
    registry: Weak<Registry>,
}

impl ListenerRegistration {
    /// Remove the subscription from the channel. Idempotent.
    pub fn release(&self) {
        if let Some(registry) = self.registry.upgrade() {
            if registry.remove(self.id) {
                trace!("[OAuth] Listener {} released", self.id);
            }
        }
    }
}

/// One attempt's subscription to the message channel
pub struct CompletionListener {
    registration: ListenerRegistration,
    receiver: mpsc::Receiver<WindowMessage>,
    expected_origin: String,
}

impl CompletionListener {
    /// Subscribe now; only messages posted after this call are seen
    pub fn subscribe(channel: &MessageChannel, expected_origin: impl Into<String>) -> Self {
        let (registration, receiver) = channel.register();
        Self {
            registration,
            receiver,
            expected_origin: expected_origin.into(),
        }
    }

    /// Handle that releases this subscription from outside the listener
    pub fn registration(&self) -> ListenerRegistration {
        self.registration.clone()
    }

    /// Wait for the first recognized message from the expected origin.
    ///
    /// Consumes the listener; the subscription is released when this
    /// returns, when the future is dropped, or when the registration is
    /// released (which resolves the future with `ListenerClosed`).
    pub async fn await_completion(mut self) -> Result<OAuthMessage, ListenerClosed> {
        loop {
            let Some(message) = self.receiver.recv().await else {
                return Err(ListenerClosed);
            };

            if message.origin != self.expected_origin {
                debug!(
                    "[OAuth] Ignoring message from untrusted origin {} (expected {})",
                    message.origin, self.expected_origin
                );
                continue;
            }

            match OAuthMessage::decode(&message.data) {
                Some(outcome) => return Ok(outcome),
                None => trace!("[OAuth] Ignoring unrecognized message shape"),
            }
        }
    }
}

impl Drop for CompletionListener {
    fn drop(&mut self) {
        self.registration.release();
    }
}
