use std::sync::Arc;

use tracing::{error, info};

use crate::credentials::CredentialStore;
use crate::envelope::ChatEvent;
use crate::oauth::AuthFlow;
use crate::sender::MessageSender;

/// Slash command that starts (or resumes) the OAuth authorization flow.
pub const AUTHORIZE_COMMAND_ID: i64 = 7;
/// Slash command that posts a fixed connectivity-test message.
pub const TEST_COMMAND_ID: i64 = 1;

pub const TEST_MESSAGE_TEXT: &str = "This is a test message from Pub/Sub!";

/// Outcome of classifying a single decoded chat event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RoutingDecision {
    Authorize { user: String, space: String },
    TestMessage { space: String },
    UnknownCommand { command_id: i64 },
    Ignore { event_type: String },
}

/// Classifies an event without side effects.
///
/// An event is a slash command when its type says so outright, or when
/// a plain message carries a `slashCommand` annotation.
pub fn route(event: &ChatEvent) -> RoutingDecision {
    let is_slash_command = event.event_type == "SLASH_COMMAND"
        || (event.event_type == "MESSAGE" && event.has_slash_command());

    if !is_slash_command {
        return RoutingDecision::Ignore { event_type: event.event_type.clone() };
    }

    match event.command_id() {
        AUTHORIZE_COMMAND_ID => RoutingDecision::Authorize {
            user: event.user_name().to_string(),
            space: event.space_name().to_string(),
        },
        TEST_COMMAND_ID => RoutingDecision::TestMessage { space: event.space_name().to_string() },
        command_id => RoutingDecision::UnknownCommand { command_id },
    }
}

/// Flat dispatcher over the closed command set. Each event is routed
/// independently; the router keeps no cross-event state.
pub struct CommandRouter {
    sender: Arc<dyn MessageSender>,
    credentials: Arc<dyn CredentialStore>,
    auth: Arc<AuthFlow>,
}

impl CommandRouter {
    pub fn new(
        sender: Arc<dyn MessageSender>,
        credentials: Arc<dyn CredentialStore>,
        auth: Arc<AuthFlow>,
    ) -> Self {
        Self { sender, credentials, auth }
    }

    pub async fn dispatch(&self, event: &ChatEvent) {
        match route(event) {
            RoutingDecision::Authorize { user, space } => {
                info!(user, space, "handling authorization slash command");
                self.trigger_authorization(&user, &space).await;
            }
            RoutingDecision::TestMessage { space } => {
                info!(space, "handling connectivity-test slash command");
                self.deliver(&space, TEST_MESSAGE_TEXT).await;
            }
            RoutingDecision::UnknownCommand { command_id } => {
                info!(command_id, "received unknown slash command");
            }
            RoutingDecision::Ignore { event_type } => {
                info!(event_type, "ignoring non-command event");
            }
        }
    }

    async fn trigger_authorization(&self, user: &str, space: &str) {
        if self.credentials.has_credentials(user).await {
            // Stub path: posting with stored user credentials belongs to
            // the external credential store integration.
            info!(user, "user already authorized; skipping consent prompt");
            return;
        }

        match self.auth.authorization_url(user) {
            Ok(url) => {
                self.deliver(space, &format!("Please authorize access to use this command: {url}"))
                    .await;
            }
            Err(error) => {
                self.deliver(space, &format!("Configuration Error: {error}")).await;
            }
        }
    }

    /// Single recovery point for outbound failures: log and swallow so
    /// nothing propagates back to the webhook boundary.
    async fn deliver(&self, space: &str, text: &str) {
        if let Err(error) = self.sender.send(space, text).await {
            error!(error = %error, space, "failed to send chat message");
        }
    }
}
