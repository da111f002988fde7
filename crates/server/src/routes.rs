//! HTTP surface for the bot.
//!
//! - `GET  /`                — health-check string
//! - `POST /`                — Pub/Sub push webhook (always acknowledges)
//! - `GET  /oauth2/callback` — OAuth authorization-code callback
//!
//! The push handler is the boundary-level recovery wrapper: every
//! internal fault is converted into a log line plus `200 OK`, because
//! a non-success response would make the push source redeliver a
//! payload we have already recorded as malformed. Only the OAuth
//! callback reports failure to its caller, and it does so in the body
//! while still answering 200.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use pushbot_chat::envelope::{self, DecodedPush};
use pushbot_chat::oauth::AuthFlow;
use pushbot_chat::CommandRouter;
use serde::Deserialize;
use tracing::{error, info, warn};

#[derive(Clone)]
pub struct AppState {
    router: Arc<CommandRouter>,
    auth: Arc<AuthFlow>,
}

impl AppState {
    pub fn new(router: Arc<CommandRouter>, auth: Arc<AuthFlow>) -> Self {
        Self { router, auth }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health).post(receive_push))
        .route("/oauth2/callback", get(oauth_callback))
        .with_state(state)
}

async fn health() -> &'static str {
    "Pushbot is running!"
}

async fn receive_push(State(state): State<AppState>, body: Bytes) -> StatusCode {
    info!(event_name = "webhook.push.received", bytes = body.len(), "received push delivery");

    match envelope::decode(&body) {
        Ok(DecodedPush::Event(event)) => {
            info!(event_type = %event.event_type, "decoded chat event");
            state.router.dispatch(&event).await;
        }
        Ok(DecodedPush::NoOp) => {
            warn!("push envelope has no message data; dropping");
        }
        Err(decode_error) => {
            error!(error = %decode_error, "failed to decode push envelope");
        }
    }

    StatusCode::OK
}

#[derive(Debug, Deserialize)]
struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

async fn oauth_callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
) -> String {
    info!(event_name = "oauth.callback.received", "received OAuth callback");

    if let Some(provider_error) = query.error {
        warn!(provider_error, "OAuth provider returned an error");
        return format!("Authorization failed: provider returned `{provider_error}`.");
    }

    let Some(code) = query.code.filter(|code| !code.trim().is_empty()) else {
        warn!("OAuth callback arrived without an authorization code");
        return "Authorization failed: callback did not include an authorization code.".to_string();
    };

    match state.auth.complete_authorization(&code, query.state.as_deref()).await {
        Ok(authorized) => {
            info!(
                user = %authorized.user,
                has_refresh_token = authorized.tokens.refresh_token.is_some(),
                "authorization completed"
            );
            "Authorization successful! You can now use the slash command.".to_string()
        }
        Err(flow_error) => {
            error!(error = %flow_error, "authorization failed");
            format!("Authorization failed: {flow_error}")
        }
    }
}
