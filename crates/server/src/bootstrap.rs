use std::sync::Arc;
use std::time::Duration;

use pushbot_chat::{
    AuthFlow, ChatApiSender, CommandRouter, MessageSender, StubCredentialStore, UnavailableSender,
};
use pushbot_core::config::{AppConfig, ConfigError};
use thiserror::Error;
use tracing::{error, info};

use crate::routes::AppState;

pub struct Application {
    pub config: AppConfig,
    pub state: AppState,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("http client construction failed: {0}")]
    HttpClient(#[source] reqwest::Error),
}

pub fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        "starting application bootstrap"
    );

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.chat.timeout_secs))
        .build()
        .map_err(BootstrapError::HttpClient)?;

    // The messaging client is constructed exactly once; a failed init
    // leaves a sender that logs and refuses sends instead of a handle
    // that might be null mid-request.
    let sender: Arc<dyn MessageSender> = match ChatApiSender::new(&config.chat, client.clone()) {
        Ok(sender) => {
            info!(
                event_name = "system.bootstrap.chat_sender_ready",
                "chat messaging client initialized"
            );
            Arc::new(sender)
        }
        Err(init_error) => {
            error!(
                event_name = "system.bootstrap.chat_sender_unavailable",
                error = %init_error,
                "chat messaging client failed to initialize; outbound messages will be dropped"
            );
            Arc::new(UnavailableSender::new(init_error.to_string()))
        }
    };

    let auth = Arc::new(AuthFlow::new(config.google.clone(), client));
    let router =
        Arc::new(CommandRouter::new(sender, Arc::new(StubCredentialStore), auth.clone()));

    Ok(Application { config, state: AppState::new(router, auth) })
}
