//! Loopback callback page
//!
//! The provider redirect ends on `http://127.0.0.1:{port}/oauth/complete`.
//! The page plays the part of the popup document: it turns the query string
//! into an `OAUTH_SUCCESS`/`OAUTH_ERROR` message and posts it into the
//! message channel with its own origin. Validation stays with the
//! orchestrator.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse},
    routing::get,
    Router,
};
use dmflow_connect::MessageChannel;
use dmflow_core::{branding, OAuthMessage, WindowMessage};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Query parameters of the provider redirect
#[derive(Debug, Default, Deserialize)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

impl CallbackParams {
    /// Message the popup would post for these parameters
    fn into_message(self) -> Option<OAuthMessage> {
        if let Some(error) = self.error {
            return Some(OAuthMessage::Error {
                error,
                error_description: self.error_description,
            });
        }
        match (self.code, self.state) {
            (Some(code), Some(state)) => Some(OAuthMessage::Success { code, state }),
            _ => None,
        }
    }
}

struct CallbackState {
    messages: MessageChannel,
    origin: String,
}

/// Running loopback server; stops when dropped
pub struct CallbackServer {
    origin: String,
    shutdown: CancellationToken,
}

impl CallbackServer {
    /// Bind to `preferred_port`, or any free port if it is taken
    pub async fn start(messages: MessageChannel, preferred_port: u16) -> Result<Self> {
        let listener = bind_with_fallback(preferred_port).await?;
        let port = listener.local_addr()?.port();
        let origin = format!("http://127.0.0.1:{}", port);
        info!("[OAuth] Callback page listening on {}", origin);

        let state = Arc::new(CallbackState {
            messages,
            origin: origin.clone(),
        });
        let app = router(state);

        let shutdown = CancellationToken::new();
        let stop = shutdown.clone();
        tokio::spawn(async move {
            let server = axum::serve(listener, app).with_graceful_shutdown(async move {
                stop.cancelled().await;
                debug!("[OAuth] Callback page shutting down");
            });
            if let Err(e) = server.await {
                error!("[OAuth] Callback page error: {}", e);
            }
        });

        Ok(Self { origin, shutdown })
    }

    /// Origin messages from this page carry
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Full redirect URL to register with the backend
    pub fn redirect_url(&self) -> String {
        format!("{}{}", self.origin, branding::loopback_callback_path())
    }
}

impl Drop for CallbackServer {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn bind_with_fallback(preferred_port: u16) -> Result<TcpListener> {
    match TcpListener::bind(("127.0.0.1", preferred_port)).await {
        Ok(listener) => Ok(listener),
        Err(_) => {
            info!(
                "[OAuth] Preferred port {} unavailable, allocating dynamic port",
                preferred_port
            );
            TcpListener::bind(("127.0.0.1", 0))
                .await
                .context("Failed to bind loopback callback page")
        }
    }
}

fn router(state: Arc<CallbackState>) -> Router {
    Router::new()
        .route(branding::loopback_callback_path(), get(complete))
        .with_state(state)
}

async fn complete(
    State(state): State<Arc<CallbackState>>,
    Query(params): Query<CallbackParams>,
) -> impl IntoResponse {
    let Some(message) = params.into_message() else {
        warn!("[OAuth] Callback page hit without code/state or error");
        return (
            StatusCode::BAD_REQUEST,
            Html(page("Authorization Incomplete", "The provider did not return a result.")),
        );
    };

    let heading = match &message {
        OAuthMessage::Success { .. } => "Authorization Complete",
        OAuthMessage::Error { .. } => "Authorization Not Granted",
    };
    let delivered = state
        .messages
        .post(WindowMessage::new(state.origin.clone(), message.to_value()));
    debug!("[OAuth] Callback delivered to {} listener(s)", delivered);

    (
        StatusCode::OK,
        Html(page(
            heading,
            &format!("You can close this window and return to {}.", branding::DISPLAY_NAME),
        )),
    )
}

fn page(heading: &str, body: &str) -> String {
    let title = branding::window_title(heading);
    format!(
        r##"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>{title}</title>
    <style>
        body {{
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
            min-height: 100vh;
            margin: 0;
            display: flex;
            align-items: center;
            justify-content: center;
            background: #14161a;
            color: #e6e6e6;
        }}
        .container {{ text-align: center; max-width: 400px; }}
        h1 {{ font-size: 1.5rem; font-weight: 600; color: #fff; }}
        p {{ color: #9a9a9a; line-height: 1.5; }}
    </style>
</head>
<body>
    <div class="container">
        <h1>{heading}</h1>
        <p>{body}</p>
    </div>
    <script>setTimeout(function(){{ window.close(); }}, 2000);</script>
</body>
</html>"##
    )
}
