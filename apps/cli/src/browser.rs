//! System browser as the authorization window
//!
//! A terminal has no window to reserve, so opening `about:blank` only
//! allocates a handle and the browser is launched on `navigate`. The browser
//! gives no signal when the user closes the tab; only windows closed by the
//! app report as closed, and the callback deadline covers abandonment.

use std::collections::HashSet;

use dmflow_connect::{PopupController, PopupError, BLANK_PAGE};
use dmflow_core::{PopupFeatures, PopupHandle};
use parking_lot::Mutex;
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

#[derive(Default)]
pub struct SystemBrowserPopup {
    closed: Mutex<HashSet<Uuid>>,
}

impl SystemBrowserPopup {
    pub fn new() -> Self {
        Self::default()
    }

    fn launch(url: &str) -> Result<(), PopupError> {
        open::that(url).map_err(|e| {
            warn!("[Popup] Failed to launch system browser: {}", e);
            PopupError::Blocked
        })
    }
}

impl PopupController for SystemBrowserPopup {
    fn open(&self, url: &str, features: &PopupFeatures) -> Result<PopupHandle, PopupError> {
        let handle = PopupHandle::new();
        debug!(
            "[Popup] Reserving window {} ({}x{})",
            features.name, features.width, features.height
        );
        if url != BLANK_PAGE {
            Self::launch(url)?;
        }
        Ok(handle)
    }

    fn navigate(&self, handle: &PopupHandle, url: &Url) -> Result<(), PopupError> {
        if self.closed.lock().contains(&handle.id) {
            return Err(PopupError::Closed);
        }
        info!(
            "[Popup] Opening {} in the system browser",
            url.host_str().unwrap_or("provider")
        );
        Self::launch(url.as_str())
    }

    fn is_closed(&self, handle: &PopupHandle) -> bool {
        self.closed.lock().contains(&handle.id)
    }

    fn close(&self, handle: &PopupHandle) {
        if self.closed.lock().insert(handle.id) {
            debug!("[Popup] Released browser window {}", handle.id);
        }
    }
}
