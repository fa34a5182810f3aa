//! Popup Controller - host window seam
//!
//! The host (browser shell, webview, native app) implements this trait. The
//! orchestrator never owns the window: the user or the provider may close it
//! at any time, so it is polled rather than tracked.

use dmflow_core::{PopupFeatures, PopupHandle};
use thiserror::Error;
use url::Url;

/// URL used to reserve a window before the authorization URL is known
pub const BLANK_PAGE: &str = "about:blank";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PopupError {
    /// The host refused to create the window (popup blocker)
    #[error("popup window was blocked by the host")]
    Blocked,
    /// The window is gone
    #[error("popup window is closed")]
    Closed,
}

pub trait PopupController: Send + Sync {
    /// Open a new top-level window at `url`.
    ///
    /// Must return `PopupError::Blocked` when the host refuses to create it.
    fn open(&self, url: &str, features: &PopupFeatures) -> Result<PopupHandle, PopupError>;

    /// Point an open window at a new URL
    fn navigate(&self, handle: &PopupHandle, url: &Url) -> Result<(), PopupError>;

    /// Non-blocking poll of the window's closed state
    fn is_closed(&self, handle: &PopupHandle) -> bool;

    /// Request the window to close. No-op if it is already closed.
    fn close(&self, handle: &PopupHandle);
}
