//! Pushbot server binary.
//!
//! Loads configuration, initializes logging, wires the command router
//! and starts the axum HTTP listener.

mod bootstrap;
mod routes;

use anyhow::Context;
use pushbot_core::{AppConfig, LoadOptions, LogFormat};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn init_logging(level: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_string()));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Compact => builder.compact().init(),
        LogFormat::Pretty => builder.pretty().init(),
        LogFormat::Json => builder.json().init(),
    }
}

async fn shutdown_signal() {
    if let Err(signal_error) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %signal_error, "failed to install shutdown signal handler");
    }
    info!(event_name = "system.server.shutdown", "shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load(LoadOptions::default()).context("failed to load configuration")?;
    init_logging(&config.logging.level, config.logging.format);

    let application = bootstrap::bootstrap_with_config(config)?;
    let bind = format!(
        "{}:{}",
        application.config.server.bind_address, application.config.server.port
    );

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("failed to bind {bind}"))?;
    info!(
        event_name = "system.server.started",
        address = %bind,
        oauth_ready = application.config.google.oauth_ready(),
        "pushbot listening"
    );

    axum::serve(listener, routes::router(application.state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server terminated unexpectedly")?;

    info!(event_name = "system.server.stopped", "pushbot stopped");
    Ok(())
}
