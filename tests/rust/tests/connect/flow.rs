//! Connection flow tests
//!
//! Happy path and every failure that ends an attempt on its own.

use std::time::Duration;

use dmflow_connect::{ExchangeOutcome, BLANK_PAGE};
use dmflow_core::{ConnectError, ConnectStatus};
use pretty_assertions::assert_eq;
use serde_json::json;
use tests::mocks::{MockBackend, MockPopupController};
use tests::services::test_config;
use tests::ConnectHarness;

// ============================================================================
// Successful Connection
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_connect_exchanges_code_and_reports_account() {
    let mut harness = ConnectHarness::with_backend(MockBackend::new().with_states([Some("abc123")]));

    let task = harness.spawn_connect();
    harness.wait_for(ConnectStatus::AwaitingCallback).await;
    assert_eq!(harness.orchestrator.status(), ConnectStatus::AwaitingCallback);

    harness.post_success("xyz", "abc123");
    let result = task.await.unwrap();

    assert!(result.connected);
    assert_eq!(result.account_handle.as_deref(), Some("shop1"));
    assert_eq!(result.error, None);
    assert_eq!(
        harness.backend.exchange_calls(),
        vec![("xyz".to_string(), "abc123".to_string())]
    );

    assert_eq!(harness.orchestrator.status(), ConnectStatus::Idle);
    assert!(harness.orchestrator.is_connected());
    assert_eq!(harness.orchestrator.connected_account().as_deref(), Some("shop1"));
    assert_eq!(harness.orchestrator.last_result(), Some(result));
}

#[tokio::test(start_paused = true)]
async fn test_popup_navigated_to_auth_url_and_closed_after_callback() {
    let mut harness = ConnectHarness::with_backend(MockBackend::new().with_states([Some("abc123")]));

    let task = harness.spawn_connect();
    harness.wait_for(ConnectStatus::AwaitingCallback).await;

    let handle = harness.popup_handle();
    let window = harness.popup.window(&handle).unwrap();
    assert!(window.url.starts_with(tests::mocks::PROVIDER_AUTH_URL));
    assert!(window.url.contains("state=abc123"));
    assert!(!window.closed);

    harness.post_success("xyz", "abc123");
    task.await.unwrap();

    let window = harness.popup.window(&handle).unwrap();
    assert!(window.closed);
    assert!(window.closed_by_app);
    assert_eq!(harness.popup.open_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_user_profile_passed_through() {
    let user = json!({ "id": 7, "username": "shop1", "plan": "pro" });
    let backend = MockBackend::new().with_exchange_result(Ok(ExchangeOutcome {
        account_handle: Some("shop1".to_string()),
        user: Some(user.clone()),
    }));
    let mut harness = ConnectHarness::with_backend(backend);

    let task = harness.spawn_connect();
    harness.wait_for(ConnectStatus::AwaitingCallback).await;
    harness.post_success("code", "state-1");

    let result = task.await.unwrap();
    assert!(result.connected);
    assert_eq!(result.user, Some(user));
}

#[tokio::test(start_paused = true)]
async fn test_local_state_appended_when_backend_issues_none() {
    let mut harness = ConnectHarness::with_backend(MockBackend::new().with_states([None]));

    let task = harness.spawn_connect();
    harness.wait_for(ConnectStatus::AwaitingCallback).await;

    let window = harness.popup.window(&harness.popup_handle()).unwrap();
    assert!(window.url.contains("state=local-1"));
    let attempt = harness.orchestrator.current_attempt().unwrap();
    assert_eq!(attempt.state_token.as_str(), "local-1");

    harness.post_success("xyz", "local-1");
    let result = task.await.unwrap();

    assert!(result.connected);
    assert_eq!(
        harness.backend.exchange_calls(),
        vec![("xyz".to_string(), "local-1".to_string())]
    );
}

#[tokio::test(start_paused = true)]
async fn test_backend_state_replaces_local_token() {
    let mut harness = ConnectHarness::with_backend(MockBackend::new().with_states([Some("abc123")]));

    let task = harness.spawn_connect();
    harness.wait_for(ConnectStatus::AwaitingCallback).await;

    let attempt = harness.orchestrator.current_attempt().unwrap();
    assert_eq!(attempt.state_token.as_str(), "abc123");

    // The locally generated token is no longer accepted
    harness.post_success("xyz", "local-1");
    let result = task.await.unwrap();
    assert_eq!(result.error, Some(ConnectError::StateMismatch));
}

// ============================================================================
// Failures
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_popup_blocked_makes_no_network_call() {
    let harness = ConnectHarness::with_popup(MockPopupController::blocking());

    let result = harness.orchestrator.connect().await;

    assert_eq!(result.error, Some(ConnectError::PopupBlocked));
    assert_eq!(harness.backend.network_calls(), 0);
    assert_eq!(harness.popup.open_count(), 0);
    assert_eq!(harness.orchestrator.status(), ConnectStatus::Idle);
    assert!(result.user_message().unwrap().contains("popup"));
}

#[tokio::test(start_paused = true)]
async fn test_popup_reserved_blank_before_login() {
    let backend = MockBackend::new().with_login_delay(Duration::from_secs(30));
    let mut harness = ConnectHarness::with_backend(backend);

    let task = harness.spawn_connect();
    harness.wait_for(ConnectStatus::AwaitingPopup).await;
    harness.settle().await;

    let window = harness.popup.window(&harness.popup_handle()).unwrap();
    assert_eq!(window.url, BLANK_PAGE);

    harness.orchestrator.cancel();
    assert!(task.await.unwrap().is_cancelled());
}

#[tokio::test(start_paused = true)]
async fn test_external_denial_reported() {
    let mut harness = ConnectHarness::new();

    let task = harness.spawn_connect();
    harness.wait_for(ConnectStatus::AwaitingCallback).await;
    harness.post_error("access_denied");

    let result = task.await.unwrap();
    assert_eq!(
        result.error,
        Some(ConnectError::ExternalDenied {
            reason: "access_denied".to_string()
        })
    );
    assert!(harness.backend.exchange_calls().is_empty());
    assert!(harness.popup.window(&harness.popup_handle()).unwrap().closed_by_app);
}

#[tokio::test(start_paused = true)]
async fn test_external_denial_includes_description() {
    let mut harness = ConnectHarness::new();

    let task = harness.spawn_connect();
    harness.wait_for(ConnectStatus::AwaitingCallback).await;
    harness.post(
        tests::TRUSTED_ORIGIN,
        json!({
            "type": "OAUTH_ERROR",
            "error": "access_denied",
            "error_description": "User declined"
        }),
    );

    let result = task.await.unwrap();
    assert_eq!(
        result.error,
        Some(ConnectError::ExternalDenied {
            reason: "access_denied: User declined".to_string()
        })
    );
}

#[tokio::test(start_paused = true)]
async fn test_callback_deadline_times_out() {
    let config = test_config().with_callback_timeout(Some(Duration::from_secs(5)));
    let harness = ConnectHarness::build(MockBackend::new(), MockPopupController::new(), config);

    let result = harness.orchestrator.connect().await;

    assert_eq!(result.error, Some(ConnectError::TimedOut { after_secs: 5 }));
    assert!(harness.backend.exchange_calls().is_empty());
    assert!(harness.popup.window(&harness.popup_handle()).unwrap().closed_by_app);
}

#[tokio::test(start_paused = true)]
async fn test_login_failure_closes_reserved_popup() {
    let backend = MockBackend::new().with_login_error(ConnectError::SessionExpired);
    let harness = ConnectHarness::with_backend(backend);

    let result = harness.orchestrator.connect().await;

    assert_eq!(result.error, Some(ConnectError::SessionExpired));
    assert_eq!(harness.backend.login_calls(), 1);
    assert!(harness.backend.exchange_calls().is_empty());
    assert!(harness.popup.window(&harness.popup_handle()).unwrap().closed_by_app);
}

#[tokio::test(start_paused = true)]
async fn test_exchange_rejection_reported() {
    let backend = MockBackend::new()
        .with_exchange_result(Err(ConnectError::ExchangeRejected("invalid code".to_string())));
    let mut harness = ConnectHarness::with_backend(backend);

    let task = harness.spawn_connect();
    harness.wait_for(ConnectStatus::AwaitingCallback).await;
    harness.post_success("stale-code", "state-1");

    let result = task.await.unwrap();
    assert!(!result.connected);
    assert_eq!(
        result.error,
        Some(ConnectError::ExchangeRejected("invalid code".to_string()))
    );
    assert!(!harness.orchestrator.is_connected());
    assert_eq!(harness.orchestrator.connected_account(), None);
}

#[tokio::test(start_paused = true)]
async fn test_retry_after_failure_uses_fresh_state() {
    let mut harness = ConnectHarness::new();

    let first = harness.spawn_connect();
    harness.wait_for(ConnectStatus::AwaitingCallback).await;
    harness.post_error("server_error");
    assert!(!first.await.unwrap().connected);

    let second = harness.spawn_connect();
    harness.wait_for(ConnectStatus::AwaitingCallback).await;
    harness.post_success("xyz", "state-2");

    let result = second.await.unwrap();
    assert!(result.connected);
    assert_eq!(harness.backend.login_calls(), 2);
    assert_eq!(harness.popup.open_count(), 2);
}
