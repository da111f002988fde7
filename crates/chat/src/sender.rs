use async_trait::async_trait;
use pushbot_core::ChatConfig;
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum SendError {
    #[error("chat messaging client is unavailable: {0}")]
    Unavailable(String),
    #[error("chat message request failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("chat API returned {status} for space `{space}`")]
    Api { status: u16, space: String },
}

#[derive(Debug, Error)]
pub enum SenderInitError {
    #[error("chat bot credential is not configured (set chat.bot_token or PUSHBOT_CHAT_BOT_TOKEN)")]
    MissingBotToken,
}

/// Posts a text message into a chat space, best effort.
#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send(&self, space: &str, text: &str) -> Result<(), SendError>;
}

/// Chat API client. Created once at startup; safe to share across
/// request handlers because it is never reconfigured after init.
#[derive(Debug)]
pub struct ChatApiSender {
    client: reqwest::Client,
    api_base_url: String,
    bot_token: SecretString,
}

impl ChatApiSender {
    pub fn new(config: &ChatConfig, client: reqwest::Client) -> Result<Self, SenderInitError> {
        let bot_token = config
            .bot_token
            .as_ref()
            .filter(|token| !token.expose_secret().trim().is_empty())
            .cloned()
            .ok_or(SenderInitError::MissingBotToken)?;

        Ok(Self {
            client,
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            bot_token,
        })
    }
}

#[async_trait]
impl MessageSender for ChatApiSender {
    async fn send(&self, space: &str, text: &str) -> Result<(), SendError> {
        let url = format!("{}/{}/messages", self.api_base_url, space.trim_matches('/'));

        let response = self
            .client
            .post(&url)
            .bearer_auth(self.bot_token.expose_secret())
            .json(&json!({ "text": text }))
            .send()
            .await
            .map_err(SendError::Transport)?;

        if !response.status().is_success() {
            return Err(SendError::Api {
                status: response.status().as_u16(),
                space: space.to_string(),
            });
        }

        info!(space, "chat message sent");
        Ok(())
    }
}

/// Stand-in installed when the real sender failed to initialize at
/// startup. Every send is refused with a logged error and nothing
/// else; the caller keeps running.
pub struct UnavailableSender {
    reason: String,
}

impl UnavailableSender {
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }
}

#[async_trait]
impl MessageSender for UnavailableSender {
    async fn send(&self, space: &str, _text: &str) -> Result<(), SendError> {
        warn!(space, reason = %self.reason, "dropping outbound chat message");
        Err(SendError::Unavailable(self.reason.clone()))
    }
}
