use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub google: GoogleConfig,
    pub chat: ChatConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
}

/// End-user OAuth client settings for the authorization-code flow.
///
/// All fields are optional at load time; an unset client is only
/// reported when a user actually triggers the authorization command.
#[derive(Clone, Debug)]
pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: SecretString,
    pub redirect_uri: String,
    pub auth_uri: String,
    pub token_uri: String,
    pub scopes: Vec<String>,
}

/// Outbound messaging client settings. The bot token is the ambient
/// credential for the Chat API and is distinct from the end-user
/// OAuth scopes in [`GoogleConfig`].
#[derive(Clone, Debug)]
pub struct ChatConfig {
    pub api_base_url: String,
    pub bot_token: Option<SecretString>,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub server_port: Option<u16>,
    pub google_client_id: Option<String>,
    pub google_client_secret: Option<String>,
    pub google_redirect_uri: Option<String>,
    pub google_auth_uri: Option<String>,
    pub google_token_uri: Option<String>,
    pub chat_api_base_url: Option<String>,
    pub chat_bot_token: Option<String>,
    pub log_level: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

pub const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
pub const DEFAULT_CHAT_API_BASE_URL: &str = "https://chat.googleapis.com/v1";

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig { bind_address: "0.0.0.0".to_string(), port: 8080 },
            google: GoogleConfig {
                client_id: String::new(),
                client_secret: String::new().into(),
                redirect_uri: String::new(),
                auth_uri: DEFAULT_AUTH_URI.to_string(),
                token_uri: DEFAULT_TOKEN_URI.to_string(),
                scopes: vec![
                    "https://www.googleapis.com/auth/chat.messages".to_string(),
                    "https://www.googleapis.com/auth/chat.spaces".to_string(),
                ],
            },
            chat: ChatConfig {
                api_base_url: DEFAULT_CHAT_API_BASE_URL.to_string(),
                bot_token: None,
                timeout_secs: 10,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("pushbot.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
        }

        if let Some(google) = patch.google {
            if let Some(client_id) = google.client_id {
                self.google.client_id = client_id;
            }
            if let Some(client_secret_value) = google.client_secret {
                self.google.client_secret = secret_value(client_secret_value);
            }
            if let Some(redirect_uri) = google.redirect_uri {
                self.google.redirect_uri = redirect_uri;
            }
            if let Some(auth_uri) = google.auth_uri {
                self.google.auth_uri = auth_uri;
            }
            if let Some(token_uri) = google.token_uri {
                self.google.token_uri = token_uri;
            }
            if let Some(scopes) = google.scopes {
                self.google.scopes = scopes;
            }
        }

        if let Some(chat) = patch.chat {
            if let Some(api_base_url) = chat.api_base_url {
                self.chat.api_base_url = api_base_url;
            }
            if let Some(bot_token_value) = chat.bot_token {
                self.chat.bot_token = Some(secret_value(bot_token_value));
            }
            if let Some(timeout_secs) = chat.timeout_secs {
                self.chat.timeout_secs = timeout_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("PUSHBOT_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        // `PORT` is what Cloud Run style hosts inject; the namespaced
        // variable wins when both are set.
        let port = read_env("PUSHBOT_SERVER_PORT")
            .map(|value| parse_u16("PUSHBOT_SERVER_PORT", &value))
            .or_else(|| read_env("PORT").map(|value| parse_u16("PORT", &value)));
        if let Some(port) = port {
            self.server.port = port?;
        }

        if let Some(value) = read_env("PUSHBOT_GOOGLE_CLIENT_ID") {
            self.google.client_id = value;
        }
        if let Some(value) = read_env("PUSHBOT_GOOGLE_CLIENT_SECRET") {
            self.google.client_secret = secret_value(value);
        }
        if let Some(value) = read_env("PUSHBOT_GOOGLE_REDIRECT_URI") {
            self.google.redirect_uri = value;
        }
        if let Some(value) = read_env("PUSHBOT_GOOGLE_AUTH_URI") {
            self.google.auth_uri = value;
        }
        if let Some(value) = read_env("PUSHBOT_GOOGLE_TOKEN_URI") {
            self.google.token_uri = value;
        }
        if let Some(value) = read_env("PUSHBOT_GOOGLE_SCOPES") {
            self.google.scopes = value
                .split(',')
                .map(str::trim)
                .filter(|scope| !scope.is_empty())
                .map(str::to_string)
                .collect();
        }

        if let Some(value) = read_env("PUSHBOT_CHAT_API_BASE_URL") {
            self.chat.api_base_url = value;
        }
        if let Some(value) = read_env("PUSHBOT_CHAT_BOT_TOKEN") {
            self.chat.bot_token = Some(secret_value(value));
        }
        if let Some(value) = read_env("PUSHBOT_CHAT_TIMEOUT_SECS") {
            self.chat.timeout_secs = parse_u64("PUSHBOT_CHAT_TIMEOUT_SECS", &value)?;
        }

        let log_level = read_env("PUSHBOT_LOGGING_LEVEL").or_else(|| read_env("PUSHBOT_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("PUSHBOT_LOGGING_FORMAT").or_else(|| read_env("PUSHBOT_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(port) = overrides.server_port {
            self.server.port = port;
        }
        if let Some(client_id) = overrides.google_client_id {
            self.google.client_id = client_id;
        }
        if let Some(client_secret) = overrides.google_client_secret {
            self.google.client_secret = secret_value(client_secret);
        }
        if let Some(redirect_uri) = overrides.google_redirect_uri {
            self.google.redirect_uri = redirect_uri;
        }
        if let Some(auth_uri) = overrides.google_auth_uri {
            self.google.auth_uri = auth_uri;
        }
        if let Some(token_uri) = overrides.google_token_uri {
            self.google.token_uri = token_uri;
        }
        if let Some(api_base_url) = overrides.chat_api_base_url {
            self.chat.api_base_url = api_base_url;
        }
        if let Some(bot_token) = overrides.chat_bot_token {
            self.chat.bot_token = Some(secret_value(bot_token));
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_server(&self.server)?;
        validate_google(&self.google)?;
        validate_chat(&self.chat)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

impl GoogleConfig {
    /// True when the authorization-code flow can be started: client id,
    /// client secret, and redirect URI are all non-empty.
    pub fn oauth_ready(&self) -> bool {
        !self.client_id.trim().is_empty()
            && !self.client_secret.expose_secret().trim().is_empty()
            && !self.redirect_uri.trim().is_empty()
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("pushbot.toml"), PathBuf::from("config/pushbot.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.bind_address.trim().is_empty() {
        return Err(ConfigError::Validation("server.bind_address must not be empty".to_string()));
    }

    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    Ok(())
}

fn validate_google(google: &GoogleConfig) -> Result<(), ConfigError> {
    for (key, value) in [("google.auth_uri", &google.auth_uri), ("google.token_uri", &google.token_uri)] {
        if !is_http_url(value) {
            return Err(ConfigError::Validation(format!(
                "{key} must start with http:// or https://"
            )));
        }
    }

    let redirect = google.redirect_uri.trim();
    if !redirect.is_empty() && !is_http_url(redirect) {
        return Err(ConfigError::Validation(
            "google.redirect_uri must start with http:// or https://".to_string(),
        ));
    }

    if google.scopes.is_empty() || google.scopes.iter().any(|scope| scope.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "google.scopes must be a non-empty list of non-empty scope URLs".to_string(),
        ));
    }

    Ok(())
}

fn validate_chat(chat: &ChatConfig) -> Result<(), ConfigError> {
    if !is_http_url(&chat.api_base_url) {
        return Err(ConfigError::Validation(
            "chat.api_base_url must start with http:// or https://".to_string(),
        ));
    }

    if chat.timeout_secs == 0 || chat.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "chat.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn is_http_url(value: &str) -> bool {
    let trimmed = value.trim();
    trimmed.starts_with("http://") || trimmed.starts_with("https://")
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    server: Option<ServerPatch>,
    google: Option<GooglePatch>,
    chat: Option<ChatPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
struct GooglePatch {
    client_id: Option<String>,
    client_secret: Option<String>,
    redirect_uri: Option<String>,
    auth_uri: Option<String>,
    token_uri: Option<String>,
    scopes: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct ChatPatch {
    api_base_url: Option<String>,
    bot_token: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn defaults_match_the_provider_endpoints() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let config = AppConfig::load(LoadOptions::default())
            .map_err(|err| format!("config load failed: {err}"))?;

        ensure(config.server.port == 8080, "default port should be 8080")?;
        ensure(
            config.google.token_uri == "https://oauth2.googleapis.com/token",
            "default token endpoint should be the Google endpoint",
        )?;
        ensure(config.google.scopes.len() == 2, "default scope set should have two entries")?;
        ensure(!config.google.oauth_ready(), "oauth should not be ready without a client")?;
        Ok(())
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_GOOGLE_CLIENT_SECRET", "secret-from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("pushbot.toml");
            fs::write(
                &path,
                r#"
[google]
client_id = "client-from-file"
client_secret = "${TEST_GOOGLE_CLIENT_SECRET}"
redirect_uri = "https://bot.example.com/oauth2/callback"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.google.client_secret.expose_secret() == "secret-from-env",
                "client secret should be interpolated from the environment",
            )?;
            ensure(config.google.oauth_ready(), "oauth should be ready with a full client")?;
            Ok(())
        })();

        clear_vars(&["TEST_GOOGLE_CLIENT_SECRET"]);
        result
    }

    #[test]
    fn port_env_alias_is_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("PORT", "9090");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            ensure(config.server.port == 9090, "PORT alias should set the listening port")
        })();

        clear_vars(&["PORT"]);
        result
    }

    #[test]
    fn namespaced_port_wins_over_alias() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("PORT", "9090");
        env::set_var("PUSHBOT_SERVER_PORT", "7070");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            ensure(config.server.port == 7070, "namespaced port should win over PORT")
        })();

        clear_vars(&["PORT", "PUSHBOT_SERVER_PORT"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("PUSHBOT_GOOGLE_CLIENT_ID", "client-from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("pushbot.toml");
            fs::write(
                &path,
                r#"
[google]
client_id = "client-from-file"

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.google.client_id == "client-from-env",
                "env client id should win over the file value",
            )?;
            ensure(config.logging.level == "debug", "override log level should win")?;
            Ok(())
        })();

        clear_vars(&["PUSHBOT_GOOGLE_CLIENT_ID"]);
        result
    }

    #[test]
    fn scope_env_override_is_comma_separated() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var(
            "PUSHBOT_GOOGLE_SCOPES",
            "https://www.googleapis.com/auth/chat.messages, https://www.googleapis.com/auth/chat.memberships",
        );

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            ensure(config.google.scopes.len() == 2, "scope list should have two entries")?;
            ensure(
                config.google.scopes[1].ends_with("chat.memberships"),
                "scope entries should be trimmed",
            )?;
            Ok(())
        })();

        clear_vars(&["PUSHBOT_GOOGLE_SCOPES"]);
        result
    }

    #[test]
    fn validation_rejects_zero_timeout() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("PUSHBOT_CHAT_TIMEOUT_SECS", "0");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("chat.timeout_secs")
            );
            ensure(has_message, "validation failure should mention chat.timeout_secs")
        })();

        clear_vars(&["PUSHBOT_CHAT_TIMEOUT_SECS"]);
        result
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("PUSHBOT_GOOGLE_CLIENT_SECRET", "oauth-secret-value");
        env::set_var("PUSHBOT_CHAT_BOT_TOKEN", "bot-token-value");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");

            ensure(
                !debug.contains("oauth-secret-value"),
                "debug output should not contain the client secret",
            )?;
            ensure(
                !debug.contains("bot-token-value"),
                "debug output should not contain the bot token",
            )?;
            ensure(
                matches!(config.logging.format, LogFormat::Compact),
                "default logging format should be compact",
            )?;
            Ok(())
        })();

        clear_vars(&["PUSHBOT_GOOGLE_CLIENT_SECRET", "PUSHBOT_CHAT_BOT_TOKEN"]);
        result
    }
}
