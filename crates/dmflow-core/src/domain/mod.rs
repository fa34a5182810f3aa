//! Domain entities, value objects, and events
//!
//! This module contains all domain-level types for the OAuth Connect flow:
//! - Entities (ConnectionAttempt)
//! - Value Objects (StateToken, ConnectStatus, PopupHandle, ConnectionResult)
//! - Wire types exchanged with the popup (WindowMessage, OAuthMessage)
//! - Status events (StatusEvent) for UI binding

mod attempt;
mod error;
mod event;
mod message;
mod popup;
mod result;
mod state_token;

pub use attempt::{AttemptId, ConnectStatus, ConnectionAttempt};
pub use error::ConnectError;
pub use event::StatusEvent;
pub use message::{OAuthMessage, WindowMessage};
pub use popup::{PopupFeatures, PopupHandle};
pub use result::ConnectionResult;
pub use state_token::StateToken;
