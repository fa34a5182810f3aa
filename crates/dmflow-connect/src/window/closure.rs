//! Closure Watcher
//!
//! Catches the user closing the popup without the provider ever posting a
//! message. Raced against the completion listener; whichever settles first
//! decides the attempt and the other future is dropped.

use std::time::Duration;

use dmflow_core::PopupHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use super::PopupController;

/// The popup was closed before any completion message arrived
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClosedWithoutCompletion {
    pub handle: PopupHandle,
}

/// Poll `popup.is_closed(handle)` every `interval` until it reports closed.
///
/// The first check happens one interval after the call, giving the host
/// time to finish creating the window.
pub async fn watch_for_closure(
    popup: &dyn PopupController,
    handle: &PopupHandle,
    interval: Duration,
) -> ClosedWithoutCompletion {
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    debug!("[Popup] Watching popup {} for closure", handle.id);

    loop {
        ticker.tick().await;
        if popup.is_closed(handle) {
            info!("[Popup] Popup {} closed without completing", handle.id);
            return ClosedWithoutCompletion {
                handle: handle.clone(),
            };
        }
    }
}
