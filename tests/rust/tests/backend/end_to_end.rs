//! Full connection attempts over HTTP
//!
//! Real `HttpConnectBackend` against wiremock, mock popup, real clock.

use std::sync::Arc;
use std::time::Duration;

use dmflow_connect::{ConnectionOrchestrator, HttpConnectBackend, MessageChannel};
use dmflow_core::{
    ConnectConfig, ConnectError, ConnectStatus, EventReceiver, OAuthMessage, WindowMessage,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use tests::events::wait_for_status;
use tests::mocks::MockPopupController;
use tests::TRUSTED_ORIGIN;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const AUTH_URL: &str = "https://provider.example/oauth/authorize?client_id=1&state=abc123";

struct Setup {
    orchestrator: Arc<ConnectionOrchestrator>,
    popup: Arc<MockPopupController>,
    messages: MessageChannel,
    events: EventReceiver,
}

fn setup(server: &MockServer) -> Setup {
    let config = ConnectConfig::new(server.uri(), TRUSTED_ORIGIN)
        .with_poll_interval(Duration::from_millis(20))
        .with_callback_timeout(Some(Duration::from_secs(5)));
    let backend = Arc::new(HttpConnectBackend::new(&config).unwrap());
    let popup = Arc::new(MockPopupController::new());
    let messages = MessageChannel::new();

    let orchestrator =
        ConnectionOrchestrator::new(config, backend, popup.clone(), messages.clone()).unwrap();
    let events = orchestrator.subscribe();

    Setup {
        orchestrator: Arc::new(orchestrator),
        popup,
        messages,
        events,
    }
}

async fn mount_login(server: &MockServer, auth_url: &str, state: &str) {
    Mock::given(method("GET"))
        .and(path("/auth/instagram/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "auth_url": auth_url,
            "state": state
        })))
        .expect(1)
        .mount(server)
        .await;
}

async fn wait_for_callback(events: &mut EventReceiver) {
    wait_for_status(events, Duration::from_secs(5), |s| *s == ConnectStatus::AwaitingCallback)
        .await
        .expect("attempt reached AwaitingCallback");
}

#[tokio::test]
async fn test_connect_over_http() {
    let server = MockServer::start().await;
    mount_login(&server, "https://provider/auth", "abc123").await;
    Mock::given(method("POST"))
        .and(path("/auth/instagram/callback"))
        .and(body_json(json!({ "code": "xyz", "state": "abc123" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "connected": true,
            "account_handle": "shop1"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut setup = setup(&server);
    let orchestrator = setup.orchestrator.clone();
    let task = tokio::spawn(async move { orchestrator.connect().await });

    wait_for_callback(&mut setup.events).await;
    setup.messages.post(WindowMessage::new(
        TRUSTED_ORIGIN,
        OAuthMessage::success("xyz", "abc123").to_value(),
    ));

    let result = task.await.unwrap();
    assert!(result.connected);
    assert_eq!(result.account_handle.as_deref(), Some("shop1"));
    let navigated = setup.popup.window(&setup.popup.last_handle().unwrap()).unwrap();
    assert_eq!(navigated.url, "https://provider/auth");
    assert_eq!(setup.orchestrator.connected_account().as_deref(), Some("shop1"));
}

#[tokio::test]
async fn test_forged_state_never_reaches_backend() {
    let server = MockServer::start().await;
    mount_login(&server, AUTH_URL, "abc123").await;
    Mock::given(method("POST"))
        .and(path("/auth/instagram/callback"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "connected": true })))
        .expect(0)
        .mount(&server)
        .await;

    let mut setup = setup(&server);
    let orchestrator = setup.orchestrator.clone();
    let task = tokio::spawn(async move { orchestrator.connect().await });

    wait_for_callback(&mut setup.events).await;
    setup.messages.post(WindowMessage::new(
        TRUSTED_ORIGIN,
        OAuthMessage::success("xyz", "forged").to_value(),
    ));

    let result = task.await.unwrap();
    assert_eq!(result.error, Some(ConnectError::StateMismatch));
}

#[tokio::test]
async fn test_closed_popup_skips_exchange() {
    let server = MockServer::start().await;
    mount_login(&server, AUTH_URL, "abc123").await;
    Mock::given(method("POST"))
        .and(path("/auth/instagram/callback"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut setup = setup(&server);
    let orchestrator = setup.orchestrator.clone();
    let task = tokio::spawn(async move { orchestrator.connect().await });

    wait_for_callback(&mut setup.events).await;
    let handle = setup.popup.last_handle().unwrap();
    setup.popup.close_by_user(&handle);

    let result = task.await.unwrap();
    assert!(result.is_cancelled());
}

#[tokio::test]
async fn test_rejected_exchange_surfaces_backend_message() {
    let server = MockServer::start().await;
    mount_login(&server, AUTH_URL, "abc123").await;
    Mock::given(method("POST"))
        .and(path("/auth/instagram/callback"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({ "detail": "Invalid authorization code" })),
        )
        .mount(&server)
        .await;

    let mut setup = setup(&server);
    let orchestrator = setup.orchestrator.clone();
    let task = tokio::spawn(async move { orchestrator.connect().await });

    wait_for_callback(&mut setup.events).await;
    setup.messages.post(WindowMessage::new(
        TRUSTED_ORIGIN,
        OAuthMessage::success("used-code", "abc123").to_value(),
    ));

    let result = task.await.unwrap();
    assert_eq!(
        result.error,
        Some(ConnectError::ExchangeRejected("Invalid authorization code".to_string()))
    );
    assert!(!setup.orchestrator.is_connected());
}
