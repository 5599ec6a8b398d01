use std::sync::Arc;

use intake_core::config::AppConfig;
use thiserror::Error;

use crate::{
    api::{HttpSlackApi, SlackApi, SlackApiError},
    attachments::AttachmentRelayHandler,
    background::BackgroundTasks,
    commands::LegalCommandHandler,
    events::EventDispatcher,
    form::FormDefinition,
    submission::{ChannelPolicy, SubmissionHandler},
    webhook::{WebhookError, WebhookForwarder},
};

#[derive(Debug, Error)]
pub enum ServicesError {
    #[error(transparent)]
    SlackApi(#[from] SlackApiError),
    #[error(transparent)]
    Webhook(#[from] WebhookError),
}

/// Everything the handlers need, injected once at startup.
#[derive(Clone)]
pub struct IntakeServices {
    pub api: Arc<dyn SlackApi>,
    pub forwarder: WebhookForwarder,
    pub form: Arc<FormDefinition>,
    pub channels: ChannelPolicy,
    pub post_thread_confirmation: bool,
}

impl IntakeServices {
    pub fn new(api: Arc<dyn SlackApi>, forwarder: WebhookForwarder) -> Self {
        Self {
            api,
            forwarder,
            form: Arc::new(FormDefinition::default()),
            channels: ChannelPolicy::default(),
            post_thread_confirmation: true,
        }
    }

    pub fn from_config(
        config: &AppConfig,
        background: BackgroundTasks,
    ) -> Result<Self, ServicesError> {
        let api = HttpSlackApi::new(&config.slack.api_base_url, config.slack.bot_token.clone())?;
        let forwarder = WebhookForwarder::from_config(&config.intake, background)?;

        Ok(Self::new(Arc::new(api), forwarder)
            .with_form(FormDefinition::from_config(&config.form))
            .with_channels(ChannelPolicy::from_config(&config.intake))
            .with_thread_confirmation(config.intake.post_thread_confirmation))
    }

    pub fn with_form(mut self, form: FormDefinition) -> Self {
        self.form = Arc::new(form);
        self
    }

    pub fn with_channels(mut self, channels: ChannelPolicy) -> Self {
        self.channels = channels;
        self
    }

    pub fn with_thread_confirmation(mut self, enabled: bool) -> Self {
        self.post_thread_confirmation = enabled;
        self
    }
}

pub fn intake_dispatcher(services: &IntakeServices) -> EventDispatcher {
    let mut dispatcher = EventDispatcher::new();
    dispatcher.register(LegalCommandHandler::new(services.clone()));
    dispatcher.register(SubmissionHandler::new(services.clone()));
    dispatcher.register(AttachmentRelayHandler::new(services.clone()));
    dispatcher
}
