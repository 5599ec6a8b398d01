use async_trait::async_trait;
use intake_core::domain::attachment::FileAttachment;
use intake_core::domain::request::ThreadRef;
use intake_core::flows::{RequestEvent, RequestStage};
use intake_core::webhook::WebhookPayload;
use tracing::{debug, info, warn};

use crate::{
    api::OutgoingMessage,
    blocks::file_saved_message,
    events::{
        EventContext, EventHandler, EventHandlerError, HandlerResult, MessageEvent, SlackEnvelope,
        SlackEvent, SlackEventType, SharedFile,
    },
    services::IntakeServices,
};

const FILE_SHARE_SUBTYPE: &str = "file_share";

/// A threaded file share worth relaying, or `None`.
pub fn threaded_file_share(event: &MessageEvent) -> Option<(&SharedFile, &str)> {
    if event.subtype.as_deref() != Some(FILE_SHARE_SUBTYPE) {
        return None;
    }
    let thread_ts = event.thread_ts.as_deref()?;
    // Only the first file of a multi-file share is relayed.
    let file = event.files.first()?;
    Some((file, thread_ts))
}

/// Relays files shared inside a request thread to the automation webhook.
pub struct AttachmentRelayHandler {
    services: IntakeServices,
}

impl AttachmentRelayHandler {
    pub fn new(services: IntakeServices) -> Self {
        Self { services }
    }
}

#[async_trait]
impl EventHandler for AttachmentRelayHandler {
    fn event_type(&self) -> SlackEventType {
        SlackEventType::Message
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::Message(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };
        let Some((file, thread_ts)) = threaded_file_share(event) else {
            debug!(
                event_name = "intake.attachment.ignored",
                correlation_id = %ctx.correlation_id,
                channel_id = %event.channel_id,
                subtype = event.subtype.as_deref().unwrap_or("none"),
                "message is not a threaded file share"
            );
            return Ok(HandlerResult::Ignored);
        };
        ctx.ack.ack();

        let shared = RequestStage::Idle.apply(RequestEvent::AttachmentShared)?;
        let info = match self.services.api.file_info(&file.id).await {
            Ok(info) => info,
            Err(error) => {
                warn!(
                    event_name = "intake.attachment.lookup_failed",
                    correlation_id = %ctx.correlation_id,
                    channel_id = %event.channel_id,
                    thread_ts,
                    file_id = %file.id,
                    file_name = file.name.as_deref().unwrap_or("unknown"),
                    error = %error,
                    "failed to resolve shared file"
                );
                return Ok(HandlerResult::Processed);
            }
        };

        let attachment = FileAttachment {
            file_id: info.id,
            file_name: info.name,
            download_url: info.download_url,
            thread: ThreadRef::new(&event.channel_id, thread_ts),
        };
        let outcome = self
            .services
            .forwarder
            .forward(WebhookPayload::file_upload(&attachment), &ctx.correlation_id)
            .await;
        if outcome.is_failed() {
            return Ok(HandlerResult::Processed);
        }

        let confirmation = OutgoingMessage::new(
            &attachment.thread.channel_id,
            file_saved_message(&attachment.file_name),
        )
        .in_thread(&attachment.thread.thread_ts);
        match self.services.api.post_message(&confirmation).await {
            Ok(_) => info!(
                event_name = "intake.attachment.relayed",
                correlation_id = %ctx.correlation_id,
                channel_id = %attachment.thread.channel_id,
                thread_ts = %attachment.thread.thread_ts,
                file_name = %attachment.file_name,
                user_id = event.user_id.as_deref().unwrap_or("unknown"),
                stage = shared.to.as_str(),
                "relayed thread attachment"
            ),
            Err(error) => warn!(
                event_name = "intake.attachment.confirmation_failed",
                correlation_id = %ctx.correlation_id,
                channel_id = %attachment.thread.channel_id,
                thread_ts = %attachment.thread.thread_ts,
                error = %error,
                "failed to post attachment confirmation"
            ),
        }

        Ok(HandlerResult::Processed)
    }
}
