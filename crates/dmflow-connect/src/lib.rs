//! DMFlow OAuth Connect
//!
//! Popup-based account connection for the merchant dashboard:
//! - Per-attempt state tokens (anti-CSRF)
//! - Popup control behind a host-implemented trait
//! - Completion listener over a cross-window message channel
//! - Closure watcher for abandoned popups
//! - Code exchange against the dashboard API
//! - A single orchestrator owning the live attempt

pub mod oauth;
pub mod orchestrator;
pub mod window;

pub use oauth::{
    generate_state, AuthUrlGrant, ConnectBackend, ExchangeOutcome, HttpConnectBackend,
    RandomStateTokens, StateTokenSource,
};
pub use orchestrator::{ConnectionOrchestrator, StatusSubscription};
pub use window::{
    watch_for_closure, ClosedWithoutCompletion, CompletionListener, ListenerClosed,
    ListenerRegistration, MessageChannel, PopupController, PopupError, BLANK_PAGE,
};
