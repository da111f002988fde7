//! Shared configuration for the pushbot services.
//!
//! Configuration is resolved in layers: built-in defaults, then an
//! optional `pushbot.toml` file (with `${ENV}` interpolation), then
//! `PUSHBOT_*` environment variables, then programmatic overrides.
//! The merged result is validated before any component starts.

pub mod config;

pub use config::{
    AppConfig, ChatConfig, ConfigError, ConfigOverrides, GoogleConfig, LoadOptions, LogFormat,
    LoggingConfig, ServerConfig,
};
