mod bootstrap;
mod health;
mod receiver;

use std::time::Duration;

use anyhow::Result;
use intake_core::config::{AppConfig, LoadOptions};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn init_logging(config: &AppConfig) {
    use intake_core::config::LogFormat::*;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_env_filter(filter).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_env_filter(filter).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_env_filter(filter).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // A missing .env is normal in deployed environments.
    let _ = dotenvy::dotenv();

    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config)?;

    let health_state = health::HealthState::new(app.services.forwarder.is_configured());
    let receiver_state = receiver::ReceiverState::new(
        app.config.slack.signing_secret.clone(),
        app.dispatcher.clone(),
        app.background.clone(),
    );
    let router = health::router(health_state)
        .merge(receiver::router(&app.config.server.events_path, receiver_state));

    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;
    info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        bind_address = %address,
        events_path = %app.config.server.events_path,
        "legal-intake server listening"
    );

    axum::serve(listener, router).with_graceful_shutdown(shutdown_signal()).await?;

    info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        pending_tasks = app.background.pending(),
        "draining in-flight work"
    );
    app.background.shutdown(Duration::from_secs(app.config.server.graceful_shutdown_secs)).await;
    info!(
        event_name = "system.server.stopped",
        correlation_id = "shutdown",
        background_failures = app.background.failure_count(),
        webhook_skipped = app.services.forwarder.skipped_count(),
        "legal-intake server stopped"
    );

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            warn!(event_name = "system.server.signal_error", error = %error, "ctrl-c handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(error) => {
                warn!(event_name = "system.server.signal_error", error = %error, "sigterm handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!(event_name = "system.server.signal", signal = "ctrl_c", "shutdown requested"),
        _ = terminate => info!(event_name = "system.server.signal", signal = "terminate", "shutdown requested"),
    }
}
