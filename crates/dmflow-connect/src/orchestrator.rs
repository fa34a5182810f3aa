//! Connection Orchestrator
//!
//! Wires the state token generator, popup controller, completion listener,
//! closure watcher and code exchanger into a single `connect()` call.
//!
//! ```text
//! Idle ─connect()─> Pending ─> AwaitingPopup ─┬─ blocked ──────────────> Failed(PopupBlocked)
//!                                             └─ auth URL + navigate ─> AwaitingCallback
//! AwaitingCallback ─┬─ OAUTH_SUCCESS, state ok ─> Exchanging ─┬─> Connected
//!                   │                                         └─> Failed(exchange error)
//!                   ├─ OAUTH_SUCCESS, state bad ─> Failed(StateMismatch)
//!                   ├─ OAUTH_ERROR ──────────────> Failed(ExternalDenied)
//!                   ├─ popup closed ─────────────> Cancelled
//!                   └─ deadline ─────────────────> Failed(TimedOut)
//! terminal ─> Idle
//! ```
//!
//! At most one attempt is live. Starting a new one (or calling `cancel()`)
//! tears the previous one down before anything else happens: its message
//! subscription is released, its cancellation token fires, its popup is
//! closed and `Cancelled` is emitted. The attempt future notices the token at
//! its next suspension point and drops its poll timer.

use std::sync::Arc;

use anyhow::Result;
use dmflow_core::{
    AttemptId, ConnectConfig, ConnectError, ConnectStatus, ConnectionAttempt, ConnectionResult,
    EventBus, EventReceiver, EventSender, OAuthMessage, PopupHandle, StateToken, StatusEvent,
};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::oauth::{AuthUrlGrant, ConnectBackend, ExchangeOutcome, RandomStateTokens, StateTokenSource};
use crate::window::{
    watch_for_closure, CompletionListener, ListenerRegistration, MessageChannel, PopupController,
    PopupError, BLANK_PAGE,
};

/// The attempt occupying the current-attempt slot
struct LiveAttempt {
    attempt: ConnectionAttempt,
    popup: Option<PopupHandle>,
    listener: Option<ListenerRegistration>,
    cancel: CancellationToken,
}

/// Handle returned by [`ConnectionOrchestrator::on_status_change`].
///
/// The callback stops firing when this is dropped or `unsubscribe`d.
#[must_use = "dropping the subscription unsubscribes immediately"]
pub struct StatusSubscription {
    task: JoinHandle<()>,
}

impl StatusSubscription {
    pub fn unsubscribe(self) {}
}

impl Drop for StatusSubscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

pub struct ConnectionOrchestrator {
    config: ConnectConfig,
    /// Normalized form of `config.trusted_origin`
    trusted_origin: String,
    backend: Arc<dyn ConnectBackend>,
    popup: Arc<dyn PopupController>,
    messages: MessageChannel,
    tokens: Arc<dyn StateTokenSource>,
    current: Mutex<Option<LiveAttempt>>,
    last_result: Mutex<Option<ConnectionResult>>,
    /// Last `Connected` result; failed or cancelled attempts leave it alone
    last_connected: Mutex<Option<ConnectionResult>>,
    events: EventBus,
    sender: EventSender,
}

impl ConnectionOrchestrator {
    /// Create an orchestrator. Fails only on invalid configuration.
    pub fn new(
        config: ConnectConfig,
        backend: Arc<dyn ConnectBackend>,
        popup: Arc<dyn PopupController>,
        messages: MessageChannel,
    ) -> Result<Self> {
        config.validate()?;
        let trusted_origin = config.normalized_origin()?;
        let events = EventBus::new();

        Ok(Self {
            config,
            trusted_origin,
            backend,
            popup,
            messages,
            tokens: Arc::new(RandomStateTokens),
            current: Mutex::new(None),
            last_result: Mutex::new(None),
            last_connected: Mutex::new(None),
            sender: events.sender(),
            events,
        })
    }

    /// Replace the state token source
    pub fn with_state_tokens(mut self, tokens: Arc<dyn StateTokenSource>) -> Self {
        self.tokens = tokens;
        self
    }

    pub fn config(&self) -> &ConnectConfig {
        &self.config
    }

    /// Channel the host posts window messages into
    pub fn messages(&self) -> &MessageChannel {
        &self.messages
    }

    /// Raw stream of status events
    pub fn subscribe(&self) -> EventReceiver {
        self.events.subscribe()
    }

    /// Invoke `callback` for every status transition, in order.
    ///
    /// Must be called from within a tokio runtime.
    pub fn on_status_change<F>(&self, callback: F) -> StatusSubscription
    where
        F: Fn(&StatusEvent) + Send + 'static,
    {
        let mut receiver = self.events.subscribe();
        let task = tokio::spawn(async move {
            while let Some(event) = receiver.recv().await {
                callback(&event);
            }
        });
        StatusSubscription { task }
    }

    /// Status of the live attempt, or `Idle`
    pub fn status(&self) -> ConnectStatus {
        self.current
            .lock()
            .as_ref()
            .map(|live| live.attempt.status.clone())
            .unwrap_or_default()
    }

    /// Snapshot of the live attempt
    pub fn current_attempt(&self) -> Option<ConnectionAttempt> {
        self.current.lock().as_ref().map(|live| live.attempt.clone())
    }

    /// Result of the most recent attempt that reached a terminal state
    pub fn last_result(&self) -> Option<ConnectionResult> {
        self.last_result.lock().clone()
    }

    /// Whether any attempt has connected an account.
    ///
    /// A later attempt that fails or is cancelled does not undo an earlier
    /// connection.
    pub fn is_connected(&self) -> bool {
        self.last_connected.lock().is_some()
    }

    /// Account handle of the last successful connection
    pub fn connected_account(&self) -> Option<String> {
        self.last_connected
            .lock()
            .as_ref()
            .and_then(|r| r.account_handle.clone())
    }

    /// Run one connection attempt to its terminal state.
    ///
    /// Never fails: every failure is reported in the returned result.
    /// A live attempt started earlier is cancelled first.
    pub async fn connect(&self) -> ConnectionResult {
        let (attempt_id, cancel) = self.begin_attempt();
        let outcome = self.run_attempt(attempt_id, &cancel).await;
        self.finish(attempt_id, outcome)
    }

    /// Cancel the live attempt. No-op when idle.
    pub fn cancel(&self) {
        let mut slot = self.current.lock();
        let Some(live) = slot.take() else {
            debug!("[OAuth] cancel() with no live attempt");
            return;
        };

        let attempt_id = live.attempt.id;
        info!(attempt_id = %attempt_id, "[OAuth] Attempt cancelled by caller");
        self.tear_down(live);
        *self.last_result.lock() = Some(ConnectionResult::failed(attempt_id, ConnectError::Cancelled));
        self.sender.emit(StatusEvent::idle());
    }

    fn begin_attempt(&self) -> (AttemptId, CancellationToken) {
        let attempt = ConnectionAttempt::new(self.tokens.generate());
        let attempt_id = attempt.id;
        let cancel = CancellationToken::new();

        let mut slot = self.current.lock();
        if let Some(previous) = slot.take() {
            info!(
                attempt_id = %previous.attempt.id,
                "[OAuth] Superseding live attempt with {}", attempt_id
            );
            self.tear_down(previous);
        }

        info!(attempt_id = %attempt_id, "[OAuth] Starting connection attempt");
        *slot = Some(LiveAttempt {
            attempt,
            popup: None,
            listener: None,
            cancel: cancel.clone(),
        });
        self.sender
            .emit(StatusEvent::new(Some(attempt_id), ConnectStatus::Pending));

        (attempt_id, cancel)
    }

    /// Tear down a superseded or cancelled attempt. Caller holds the slot lock.
    fn tear_down(&self, live: LiveAttempt) {
        self.release(&live);
        self.sender
            .emit(StatusEvent::new(Some(live.attempt.id), ConnectStatus::Cancelled));
    }

    /// Release everything a removed attempt holds
    fn release(&self, live: &LiveAttempt) {
        if let Some(listener) = &live.listener {
            listener.release();
        }
        live.cancel.cancel();
        if let Some(handle) = &live.popup {
            self.popup.close(handle);
        }
    }

    async fn run_attempt(
        &self,
        attempt_id: AttemptId,
        cancel: &CancellationToken,
    ) -> Result<ExchangeOutcome, ConnectError> {
        // The window is reserved before any network call: hosts only allow
        // creating windows directly within the user's click.
        self.transition(attempt_id, ConnectStatus::AwaitingPopup)?;
        let listener = CompletionListener::subscribe(&self.messages, self.trusted_origin.clone());
        self.attach_listener(attempt_id, listener.registration())?;
        let handle = self
            .popup
            .open(BLANK_PAGE, &self.config.popup)
            .map_err(popup_error)?;
        self.attach_popup(attempt_id, &handle)?;

        let grant = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ConnectError::Cancelled),
            grant = self.backend.login() => grant?,
        };
        let (expected_state, auth_url) = self.bind_state(attempt_id, &grant)?;

        self.popup
            .navigate(&handle, &auth_url)
            .map_err(popup_error)?;
        info!(
            attempt_id = %attempt_id,
            "[OAuth] Popup opened at provider, state={}",
            expected_state.short()
        );
        self.transition(attempt_id, ConnectStatus::AwaitingCallback)?;

        let code = match self.await_callback(listener, &handle, cancel).await? {
            denied @ OAuthMessage::Error { .. } => {
                let reason = denied.error_message().unwrap_or_default();
                warn!(attempt_id = %attempt_id, "[OAuth] Authorization denied: {}", reason);
                return Err(ConnectError::ExternalDenied { reason });
            }
            OAuthMessage::Success { code, state } => {
                if !expected_state.matches(&state) {
                    warn!(
                        target: "dmflow::security",
                        attempt_id = %attempt_id,
                        expected = expected_state.short(),
                        "[OAuth] Callback state does not match live attempt; rejecting"
                    );
                    return Err(ConnectError::StateMismatch);
                }
                code
            }
        };

        self.popup.close(&handle);
        self.transition(attempt_id, ConnectStatus::Exchanging)?;

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ConnectError::Cancelled),
            outcome = self.backend.exchange_code(&code, &expected_state) => outcome,
        }
    }

    /// Race the listener against closure, the deadline and cancellation.
    ///
    /// Biased so that a message already delivered beats a closure observed
    /// in the same poll (popups usually post and then close themselves).
    async fn await_callback(
        &self,
        listener: CompletionListener,
        handle: &PopupHandle,
        cancel: &CancellationToken,
    ) -> Result<OAuthMessage, ConnectError> {
        let timeout = self.config.callback_timeout();
        let deadline = async move {
            match timeout {
                Some(duration) => tokio::time::sleep(duration).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ConnectError::Cancelled),
            message = listener.await_completion() => {
                message.map_err(|_| ConnectError::Protocol("message channel closed".to_string()))
            }
            _ = watch_for_closure(self.popup.as_ref(), handle, self.config.poll_interval()) => {
                Err(ConnectError::Cancelled)
            }
            _ = deadline => {
                let after_secs = timeout.map(|t| t.as_secs()).unwrap_or_default();
                warn!("[OAuth] No callback within {}s", after_secs);
                Err(ConnectError::TimedOut { after_secs })
            }
        }
    }

    /// Move the live attempt to `status`; `Cancelled` if it is no longer live
    fn transition(&self, attempt_id: AttemptId, status: ConnectStatus) -> Result<(), ConnectError> {
        let mut slot = self.current.lock();
        match slot.as_mut() {
            Some(live) if live.attempt.id == attempt_id => {
                debug!(
                    attempt_id = %attempt_id,
                    "[OAuth] {} -> {}",
                    live.attempt.status.label(),
                    status.label()
                );
                live.attempt.status = status.clone();
                self.sender.emit(StatusEvent::new(Some(attempt_id), status));
                Ok(())
            }
            _ => Err(ConnectError::Cancelled),
        }
    }

    fn attach_listener(
        &self,
        attempt_id: AttemptId,
        registration: ListenerRegistration,
    ) -> Result<(), ConnectError> {
        let mut slot = self.current.lock();
        match slot.as_mut() {
            Some(live) if live.attempt.id == attempt_id => {
                live.listener = Some(registration);
                Ok(())
            }
            _ => {
                registration.release();
                Err(ConnectError::Cancelled)
            }
        }
    }

    fn attach_popup(&self, attempt_id: AttemptId, handle: &PopupHandle) -> Result<(), ConnectError> {
        let mut slot = self.current.lock();
        match slot.as_mut() {
            Some(live) if live.attempt.id == attempt_id => {
                live.popup = Some(handle.clone());
                Ok(())
            }
            _ => {
                self.popup.close(handle);
                Err(ConnectError::Cancelled)
            }
        }
    }

    /// Decide which state token the callback must carry.
    ///
    /// A state issued by the backend (in the response or already embedded in
    /// the URL) is what the provider will echo, so it replaces the locally
    /// generated token. Otherwise the local token is added to the URL.
    fn bind_state(
        &self,
        attempt_id: AttemptId,
        grant: &AuthUrlGrant,
    ) -> Result<(StateToken, Url), ConnectError> {
        let mut slot = self.current.lock();
        let live = match slot.as_mut() {
            Some(live) if live.attempt.id == attempt_id => live,
            _ => return Err(ConnectError::Cancelled),
        };

        let mut auth_url = grant.auth_url.clone();
        let issued = grant
            .state
            .clone()
            .or_else(|| extract_state_from_url(&auth_url));

        match issued {
            Some(state) => {
                if let Some(in_url) = extract_state_from_url(&auth_url) {
                    if in_url != state {
                        return Err(ConnectError::Protocol(
                            "auth_url state differs from issued state".to_string(),
                        ));
                    }
                }
                live.attempt.state_token = StateToken::new(state);
            }
            None => {
                auth_url
                    .query_pairs_mut()
                    .append_pair("state", live.attempt.state_token.as_str());
            }
        }

        Ok((live.attempt.state_token.clone(), auth_url))
    }

    /// Record the terminal result. Only the first resolution for a still-live
    /// attempt counts; anything else was already cancelled.
    fn finish(
        &self,
        attempt_id: AttemptId,
        outcome: Result<ExchangeOutcome, ConnectError>,
    ) -> ConnectionResult {
        let result = match outcome {
            Ok(exchanged) => {
                ConnectionResult::connected(attempt_id, exchanged.account_handle, exchanged.user)
            }
            Err(error) => ConnectionResult::failed(attempt_id, error),
        };

        let mut slot = self.current.lock();
        let is_live = slot
            .as_ref()
            .map(|live| live.attempt.id == attempt_id)
            .unwrap_or(false);
        if !is_live {
            debug!(attempt_id = %attempt_id, "[OAuth] Attempt already torn down, discarding outcome");
            return ConnectionResult::failed(attempt_id, ConnectError::Cancelled);
        }

        if let Some(live) = slot.take() {
            self.release(&live);
            log_result(&result);
            self.sender
                .emit(StatusEvent::new(Some(attempt_id), result.status()));
            if result.connected {
                *self.last_connected.lock() = Some(result.clone());
            }
            *self.last_result.lock() = Some(result.clone());
            self.sender.emit(StatusEvent::idle());
        }

        result
    }
}

fn popup_error(error: PopupError) -> ConnectError {
    match error {
        PopupError::Blocked => {
            warn!("[Popup] Authorization window was blocked by the host");
            ConnectError::PopupBlocked
        }
        PopupError::Closed => ConnectError::Cancelled,
    }
}

/// Extract state parameter from an authorization URL
fn extract_state_from_url(url: &Url) -> Option<String> {
    url.query_pairs()
        .find(|(k, _)| k == "state")
        .map(|(_, v)| v.to_string())
        .filter(|v| !v.is_empty())
}

fn log_result(result: &ConnectionResult) {
    match &result.error {
        None => info!(
            attempt_id = %result.attempt_id,
            "[OAuth] Connected (account={})",
            result.account_handle.as_deref().unwrap_or("<unknown>")
        ),
        Some(ConnectError::Cancelled) => {
            info!(attempt_id = %result.attempt_id, "[OAuth] Attempt cancelled")
        }
        Some(error) => warn!(
            attempt_id = %result.attempt_id,
            kind = error.kind(),
            "[OAuth] Attempt failed: {}", error
        ),
    }
}
