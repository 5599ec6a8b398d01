use async_trait::async_trait;
use intake_core::flows::{RequestEvent, RequestStage};
use thiserror::Error;
use tracing::{info, warn};

use crate::{
    events::{
        EventContext, EventHandler, EventHandlerError, HandlerResult, SlackEnvelope, SlackEvent,
        SlackEventType,
    },
    form::FormMetadata,
    services::IntakeServices,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlashCommandPayload {
    pub command: String,
    pub text: String,
    pub channel_id: String,
    pub user_id: String,
    pub user_name: Option<String>,
    pub trigger_id: String,
    pub response_url: Option<String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandParseError {
    #[error("unsupported slash command: {0}")]
    UnsupportedCommand(String),
}

/// Accepts only the configured command name. Text after the command is ignored.
pub fn ensure_command(
    payload: &SlashCommandPayload,
    expected: &str,
) -> Result<(), CommandParseError> {
    if payload.command.trim().eq_ignore_ascii_case(expected) {
        Ok(())
    } else {
        Err(CommandParseError::UnsupportedCommand(payload.command.clone()))
    }
}

/// Opens the request modal for `/legal`.
pub struct LegalCommandHandler {
    services: IntakeServices,
}

impl LegalCommandHandler {
    pub fn new(services: IntakeServices) -> Self {
        Self { services }
    }
}

#[async_trait]
impl EventHandler for LegalCommandHandler {
    fn event_type(&self) -> SlackEventType {
        SlackEventType::SlashCommand
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::SlashCommand(payload) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };
        ensure_command(payload, &self.services.form.command)?;
        ctx.ack.ack();

        let received = RequestStage::Idle.apply(RequestEvent::CommandInvoked)?;
        let view = self.services.form.view(&FormMetadata::for_channel(&payload.channel_id));

        match self.services.api.open_modal(&payload.trigger_id, &view).await {
            Ok(()) => {
                let opened = received.to.apply(RequestEvent::ModalOpened)?;
                info!(
                    event_name = "intake.command.modal_opened",
                    correlation_id = %ctx.correlation_id,
                    channel_id = %payload.channel_id,
                    user_id = %payload.user_id,
                    stage = opened.to.as_str(),
                    "opened legal request form"
                );
            }
            Err(error) => {
                warn!(
                    event_name = "intake.command.modal_failed",
                    correlation_id = %ctx.correlation_id,
                    channel_id = %payload.channel_id,
                    user_id = %payload.user_id,
                    stage = received.to.as_str(),
                    error = %error,
                    "failed to open legal request form"
                );
            }
        }

        Ok(HandlerResult::Processed)
    }
}
