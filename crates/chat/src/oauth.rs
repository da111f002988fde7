use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use pushbot_core::GoogleConfig;
use secrecy::ExposeSecret;
use serde::Deserialize;
use thiserror::Error;
use tracing::{error, info};
use uuid::Uuid;

/// How long an issued `state` nonce stays claimable.
const STATE_TTL_MINUTES: i64 = 10;

#[derive(Debug, Error)]
pub enum AuthFlowError {
    #[error("Google OAuth parameters are not fully set. Configure google.client_id, google.client_secret, and google.redirect_uri.")]
    MissingConfiguration,
    #[error("authorization state is missing, expired, or already used")]
    UnknownState,
    #[error(transparent)]
    TokenExchange(#[from] TokenExchangeError),
}

#[derive(Debug, Error)]
pub enum TokenExchangeError {
    #[error("token endpoint request failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("token endpoint returned {0}")]
    Provider(u16),
    #[error("token endpoint response could not be decoded: {0}")]
    Decode(#[source] reqwest::Error),
    #[error("token endpoint returned an empty access token")]
    EmptyAccessToken,
}

/// Token pair returned by the provider. Ephemeral: ownership ends with
/// the callback request that produced it.
#[derive(Clone, Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Exchange result, carrying the user the claimed state was bound to.
/// Associating and persisting the tokens is the caller's concern.
#[derive(Clone, Debug)]
pub struct AuthorizedTokens {
    pub user: String,
    pub tokens: TokenResponse,
}

struct PendingAuthorization {
    user: String,
    expires_at: DateTime<Utc>,
}

/// Single-use nonce store backing the OAuth `state` parameter.
///
/// The nonce is the CSRF token; the user identity rides along bound to
/// it server-side instead of being placed in the redirect itself.
struct AuthStateStore {
    entries: Mutex<HashMap<String, PendingAuthorization>>,
    ttl: Duration,
}

impl AuthStateStore {
    fn new(ttl: Duration) -> Self {
        Self { entries: Mutex::new(HashMap::new()), ttl }
    }

    fn issue(&self, user: &str) -> String {
        let token = Uuid::new_v4().simple().to_string();
        let now = Utc::now();
        let mut entries = self.entries.lock().expect("auth state lock poisoned");
        entries.retain(|_, pending| pending.expires_at > now);
        entries.insert(
            token.clone(),
            PendingAuthorization { user: user.to_string(), expires_at: now + self.ttl },
        );
        token
    }

    fn claim(&self, token: &str) -> Option<String> {
        let mut entries = self.entries.lock().expect("auth state lock poisoned");
        let pending = entries.remove(token)?;
        (pending.expires_at > Utc::now()).then_some(pending.user)
    }
}

/// The two halves of the authorization-code flow: consent URL
/// construction and the server-to-server code exchange.
pub struct AuthFlow {
    config: GoogleConfig,
    client: reqwest::Client,
    states: AuthStateStore,
}

impl AuthFlow {
    pub fn new(config: GoogleConfig, client: reqwest::Client) -> Self {
        Self { config, client, states: AuthStateStore::new(Duration::minutes(STATE_TTL_MINUTES)) }
    }

    #[cfg(test)]
    fn with_state_ttl(config: GoogleConfig, client: reqwest::Client, ttl: Duration) -> Self {
        Self { config, client, states: AuthStateStore::new(ttl) }
    }

    fn ensure_configured(&self) -> Result<(), AuthFlowError> {
        if self.config.oauth_ready() {
            Ok(())
        } else {
            Err(AuthFlowError::MissingConfiguration)
        }
    }

    /// Builds the provider consent URL for `user` and registers the
    /// `state` nonce it embeds. Fails without building anything when
    /// the OAuth client settings are incomplete.
    pub fn authorization_url(&self, user: &str) -> Result<String, AuthFlowError> {
        self.ensure_configured()?;

        let state = self.states.issue(user);
        let scope = self.config.scopes.join(" ");
        let url = format!(
            "{auth}?response_type=code&client_id={client}&redirect_uri={redirect}&scope={scope}&access_type=offline&state={state}",
            auth = self.config.auth_uri.trim_end_matches('?'),
            client = encode_query(&self.config.client_id),
            redirect = encode_query(&self.config.redirect_uri),
            scope = encode_query(&scope),
            state = encode_query(&state),
        );

        info!(user, "issued authorization consent url");
        Ok(url)
    }

    /// Exchanges an authorization code for a token pair.
    pub async fn exchange_code(&self, code: &str) -> Result<TokenResponse, TokenExchangeError> {
        let response = self
            .client
            .post(&self.config.token_uri)
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("client_id", &self.config.client_id),
                ("client_secret", self.config.client_secret.expose_secret()),
                ("redirect_uri", &self.config.redirect_uri),
            ])
            .send()
            .await
            .map_err(|error| {
                error!(error = %error, "token exchange request failed");
                TokenExchangeError::Transport(error)
            })?;

        if !response.status().is_success() {
            return Err(TokenExchangeError::Provider(response.status().as_u16()));
        }

        let token: TokenResponse = response.json().await.map_err(TokenExchangeError::Decode)?;
        if token.access_token.is_empty() {
            return Err(TokenExchangeError::EmptyAccessToken);
        }
        Ok(token)
    }

    /// Completes the callback leg: claims the state nonce, then
    /// exchanges the code. The nonce is checked first so a forged
    /// callback never reaches the token endpoint.
    pub async fn complete_authorization(
        &self,
        code: &str,
        state: Option<&str>,
    ) -> Result<AuthorizedTokens, AuthFlowError> {
        self.ensure_configured()?;

        let user = state
            .filter(|token| !token.trim().is_empty())
            .and_then(|token| self.states.claim(token))
            .ok_or(AuthFlowError::UnknownState)?;

        let tokens = self.exchange_code(code).await?;
        info!(
            user,
            has_refresh_token = tokens.refresh_token.is_some(),
            "authorization code exchanged"
        );
        Ok(AuthorizedTokens { user, tokens })
    }
}

fn encode_query(value: &str) -> String {
    value
        .replace('%', "%25")
        .replace('+', "%2B")
        .replace(' ', "%20")
        .replace('/', "%2F")
        .replace(':', "%3A")
        .replace('&', "%26")
        .replace('=', "%3D")
}
