use std::sync::Arc;

use intake_core::config::{AppConfig, ConfigError, LoadOptions};
use intake_slack::{
    background::BackgroundTasks, events::EventDispatcher, intake_dispatcher, IntakeServices,
    ServicesError,
};
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub services: IntakeServices,
    pub dispatcher: Arc<EventDispatcher>,
    pub background: BackgroundTasks,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("intake services could not be built: {0}")]
    Services(#[from] ServicesError),
}

pub fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config)
}

pub fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let background = BackgroundTasks::new();
    let services = IntakeServices::from_config(&config, background.clone())?;
    let dispatcher = Arc::new(intake_dispatcher(&services));

    info!(
        event_name = "system.bootstrap.ready",
        correlation_id = "bootstrap",
        handlers = dispatcher.handler_count(),
        webhook_configured = services.forwarder.is_configured(),
        webhook_mode = ?services.forwarder.mode(),
        destination_channel = config.intake.destination_channel_id.as_deref().unwrap_or("none"),
        "intake services initialized"
    );

    Ok(Application { config, services, dispatcher, background })
}
