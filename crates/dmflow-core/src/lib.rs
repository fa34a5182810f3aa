//! # DMFlow Core Library
//!
//! Domain types shared by the OAuth Connect flow of the DMFlow dashboard.
//!
//! ## Modules
//!
//! - `branding` - Centralized product constants
//! - `config` - Connect flow configuration (`ConnectConfig`)
//! - `domain` - Attempts, statuses, state tokens, results, window messages
//! - `event_bus` - Status event distribution for UI binding

pub mod branding;
pub mod config;
pub mod domain;
pub mod event_bus;

// Re-export commonly used types
pub use config::ConnectConfig;
pub use domain::*;

pub use event_bus::{EventBus, EventReceiver, EventSender};
