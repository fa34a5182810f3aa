//! Shared test utilities and fixtures for DMFlow integration tests.

pub use dmflow_core::{
    AttemptId, ConnectError, ConnectStatus, ConnectionResult, OAuthMessage, StatusEvent,
};

pub use mocks::{FixedStateTokens, MockBackend, MockPopupController};

pub use services::{ConnectHarness, TRUSTED_ORIGIN};

/// Event testing utilities
pub mod events {
    use dmflow_core::{ConnectStatus, EventReceiver, StatusEvent};
    use std::time::Duration;

    /// Collect events from a receiver until `timeout` passes without one
    pub async fn collect_events(rx: &mut EventReceiver, timeout: Duration) -> Vec<StatusEvent> {
        let mut events = Vec::new();
        while let Ok(Some(event)) = tokio::time::timeout(timeout, rx.recv()).await {
            events.push(event);
        }
        events
    }

    /// Wait for the first event matching `predicate`
    pub async fn wait_for_status<F>(
        rx: &mut EventReceiver,
        timeout: Duration,
        predicate: F,
    ) -> Option<StatusEvent>
    where
        F: Fn(&ConnectStatus) -> bool,
    {
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                return None;
            }

            match tokio::time::timeout(remaining, rx.recv()).await {
                Ok(Some(event)) if predicate(&event.status) => return Some(event),
                Ok(Some(_)) => continue,
                Ok(None) => return None,
                Err(_) => return None,
            }
        }
    }

    /// Status labels in emission order, for compact assertions
    pub fn labels(events: &[StatusEvent]) -> Vec<&'static str> {
        events.iter().map(|e| e.status.label()).collect()
    }
}

/// Async test helpers
pub mod async_helpers {
    use std::time::Duration;
    use tokio::time::timeout;

    /// Run an async operation with a timeout
    pub async fn with_timeout<F, T>(duration: Duration, f: F) -> T
    where
        F: std::future::Future<Output = T>,
    {
        timeout(duration, f).await.expect("Operation timed out")
    }

    /// Default test timeout (5 seconds)
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
}
