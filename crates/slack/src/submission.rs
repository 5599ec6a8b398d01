//! Handles `view_submission` for the legal request form.
//!
//! Order of effects per submission: acknowledge, post the summary to the
//! destination channel, forward `new_request` to the automation webhook with
//! the summary's thread reference, then confirm inside that thread.

use async_trait::async_trait;
use chrono::Utc;
use intake_core::config::IntakeConfig;
use intake_core::domain::request::{value_or_placeholder, Request, ThreadRef};
use intake_core::flows::{RequestEvent, RequestStage};
use intake_core::webhook::WebhookPayload;
use tracing::{error, info, warn};

use crate::{
    api::OutgoingMessage,
    blocks::{request_recorded_message, request_summary_message},
    events::{
        EventContext, EventHandler, EventHandlerError, HandlerResult, SlackEnvelope, SlackEvent,
        SlackEventType, ViewSubmissionEvent,
    },
    form::FormMetadata,
    services::IntakeServices,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelSource {
    Configured,
    Invoking,
    Default,
}

impl ChannelSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Configured => "configured",
            Self::Invoking => "invoking",
            Self::Default => "default",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedChannel {
    pub channel_id: String,
    pub source: ChannelSource,
}

/// Destination for summary posts: configured channel, else the channel the
/// command was typed in, else the default channel.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChannelPolicy {
    pub destination: Option<String>,
    pub default: Option<String>,
}

impl ChannelPolicy {
    pub fn new(destination: Option<String>, default: Option<String>) -> Self {
        Self { destination, default }
    }

    pub fn from_config(config: &IntakeConfig) -> Self {
        Self::new(config.destination_channel_id.clone(), config.default_channel_id.clone())
    }

    pub fn resolve(&self, invoking: Option<&str>) -> Option<ResolvedChannel> {
        let candidates = [
            (self.destination.as_deref(), ChannelSource::Configured),
            (invoking, ChannelSource::Invoking),
            (self.default.as_deref(), ChannelSource::Default),
        ];
        candidates.into_iter().find_map(|(channel, source)| {
            channel
                .map(str::trim)
                .filter(|channel| !channel.is_empty())
                .map(|channel| ResolvedChannel { channel_id: channel.to_owned(), source })
        })
    }
}

pub struct SubmissionHandler {
    services: IntakeServices,
}

impl SubmissionHandler {
    pub fn new(services: IntakeServices) -> Self {
        Self { services }
    }

    async fn display_name(&self, event: &ViewSubmissionEvent, ctx: &EventContext) -> String {
        match self.services.api.user_info(&event.user_id).await {
            Ok(user) => user.display_name,
            Err(error) => {
                warn!(
                    event_name = "intake.submission.user_lookup_failed",
                    correlation_id = %ctx.correlation_id,
                    user_id = %event.user_id,
                    error = %error,
                    "falling back to payload username"
                );
                value_or_placeholder(event.user_name.as_deref(), &event.user_id)
            }
        }
    }
}

#[async_trait]
impl EventHandler for SubmissionHandler {
    fn event_type(&self) -> SlackEventType {
        SlackEventType::ViewSubmission
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::ViewSubmission(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };
        if event.callback_id != self.services.form.callback_id {
            return Ok(HandlerResult::Ignored);
        }
        ctx.ack.ack();

        let submitted = RequestStage::Idle.apply(RequestEvent::FormSubmitted)?;
        let fields = self.services.form.extract(&event.state);
        let metadata = FormMetadata::decode(event.private_metadata.as_deref());
        let request = Request {
            request_type: fields.request_type,
            counterparty: fields.counterparty,
            description: fields.description,
            submitted_by: self.display_name(event, ctx).await,
            submitter_id: event.user_id.clone(),
            origin_channel_id: metadata.channel_id,
            created_at: Utc::now(),
        };

        let Some(destination) = self.services.channels.resolve(request.origin_channel_id.as_deref())
        else {
            warn!(
                event_name = "intake.submission.no_destination",
                correlation_id = %ctx.correlation_id,
                stage = submitted.to.as_str(),
                "no destination channel configured or known; dropping submission"
            );
            return Ok(HandlerResult::Skipped("no destination channel"));
        };

        let summary = OutgoingMessage::new(&destination.channel_id, request_summary_message(&request));
        let posted = match self.services.api.post_message(&summary).await {
            Ok(posted) => posted,
            Err(error) => {
                error!(
                    event_name = "intake.submission.summary_failed",
                    correlation_id = %ctx.correlation_id,
                    channel_id = %destination.channel_id,
                    stage = submitted.to.as_str(),
                    error = %error,
                    "failed to post request summary"
                );
                return Ok(HandlerResult::Processed);
            }
        };

        let thread = ThreadRef::new(posted.channel, posted.ts);
        let notified = submitted.to.apply(RequestEvent::SummaryPosted)?;
        info!(
            event_name = "intake.submission.summary_posted",
            correlation_id = %ctx.correlation_id,
            channel_id = %thread.channel_id,
            thread_ts = %thread.thread_ts,
            channel_source = destination.source.as_str(),
            request_type = %request.request_type,
            stage = notified.to.as_str(),
            "posted legal request summary"
        );

        let outcome = self
            .services
            .forwarder
            .forward(WebhookPayload::new_request(&request, &thread), &ctx.correlation_id)
            .await;

        if !self.services.post_thread_confirmation {
            return Ok(HandlerResult::Processed);
        }

        let confirmation = OutgoingMessage::new(
            &thread.channel_id,
            request_recorded_message(outcome.folder_url()),
        )
        .in_thread(&thread.thread_ts);
        match self.services.api.post_message(&confirmation).await {
            Ok(_) => info!(
                event_name = "intake.submission.confirmation_posted",
                correlation_id = %ctx.correlation_id,
                channel_id = %thread.channel_id,
                thread_ts = %thread.thread_ts,
                webhook_failed = outcome.is_failed(),
                "posted thread confirmation"
            ),
            Err(error) => warn!(
                event_name = "intake.submission.confirmation_failed",
                correlation_id = %ctx.correlation_id,
                channel_id = %thread.channel_id,
                thread_ts = %thread.thread_ts,
                error = %error,
                "failed to post thread confirmation"
            ),
        }

        Ok(HandlerResult::Processed)
    }
}
