use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
};

use async_trait::async_trait;
use intake_core::flows::StageTransitionError;
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::warn;

use crate::{
    commands::{CommandParseError, SlashCommandPayload},
    form::ViewState,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlackEnvelope {
    pub envelope_id: String,
    pub event: SlackEvent,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SlackEvent {
    SlashCommand(SlashCommandPayload),
    ViewSubmission(ViewSubmissionEvent),
    Message(MessageEvent),
    Unsupported { event_type: String },
}

impl SlackEvent {
    pub fn event_type(&self) -> SlackEventType {
        match self {
            Self::SlashCommand(_) => SlackEventType::SlashCommand,
            Self::ViewSubmission(_) => SlackEventType::ViewSubmission,
            Self::Message(_) => SlackEventType::Message,
            Self::Unsupported { .. } => SlackEventType::Unsupported,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SlackEventType {
    SlashCommand,
    ViewSubmission,
    Message,
    Unsupported,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ViewSubmissionEvent {
    pub callback_id: String,
    pub user_id: String,
    pub user_name: Option<String>,
    pub private_metadata: Option<String>,
    pub state: ViewState,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageEvent {
    pub channel_id: String,
    pub user_id: Option<String>,
    pub subtype: Option<String>,
    pub thread_ts: Option<String>,
    pub files: Vec<SharedFile>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SharedFile {
    pub id: String,
    pub name: Option<String>,
}

/// One-shot acknowledgment signal for an inbound envelope.
///
/// The receiver holds the paired [`oneshot::Receiver`] and answers the
/// platform once it fires. Handlers call [`Acknowledger::ack`] before any
/// outbound I/O; repeated calls are no-ops.
#[derive(Debug, Default)]
pub struct Acknowledger {
    sender: Mutex<Option<oneshot::Sender<()>>>,
    acknowledged: AtomicBool,
}

impl Acknowledger {
    pub fn new() -> (Self, oneshot::Receiver<()>) {
        let (sender, receiver) = oneshot::channel();
        (Self { sender: Mutex::new(Some(sender)), acknowledged: AtomicBool::new(false) }, receiver)
    }

    /// Nobody is waiting on this one; it only records whether `ack` was called.
    pub fn detached() -> Self {
        Self::default()
    }

    pub fn ack(&self) {
        if self.acknowledged.swap(true, Ordering::SeqCst) {
            return;
        }
        let sender = self.sender.lock().ok().and_then(|mut slot| slot.take());
        if let Some(sender) = sender {
            // The receiver may have timed out already.
            let _ = sender.send(());
        }
    }

    pub fn is_acknowledged(&self) -> bool {
        self.acknowledged.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Debug)]
pub struct EventContext {
    pub correlation_id: String,
    pub ack: Arc<Acknowledger>,
}

impl EventContext {
    pub fn new(correlation_id: impl Into<String>, ack: Arc<Acknowledger>) -> Self {
        Self { correlation_id: correlation_id.into(), ack }
    }
}

impl Default for EventContext {
    fn default() -> Self {
        Self::new("unknown-correlation-id", Arc::new(Acknowledger::detached()))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerResult {
    Processed,
    Ignored,
    /// Acknowledged but not acted on.
    Skipped(&'static str),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventHandlerError {
    #[error(transparent)]
    Parse(#[from] CommandParseError),
    #[error(transparent)]
    Stage(#[from] StageTransitionError),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error(transparent)]
    Handler(#[from] EventHandlerError),
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    fn event_type(&self) -> SlackEventType;
    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;
}

#[derive(Default)]
pub struct EventDispatcher {
    handlers: HashMap<SlackEventType, Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(&mut self, handler: H)
    where
        H: EventHandler + 'static,
    {
        self.handlers.insert(handler.event_type(), Arc::new(handler));
    }

    /// Routes the envelope to its handler. The envelope is always acknowledged
    /// by the time this returns, even when no handler matched or it failed.
    pub async fn dispatch(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, DispatchError> {
        let Some(handler) = self.handlers.get(&envelope.event.event_type()) else {
            ctx.ack.ack();
            return Ok(HandlerResult::Ignored);
        };

        let result = handler.handle(envelope, ctx).await;
        ctx.ack.ack();

        result.map_err(|error| {
            warn!(
                event_name = "intake.dispatch.handler_failed",
                envelope_id = %envelope.envelope_id,
                correlation_id = %ctx.correlation_id,
                event_type = ?envelope.event.event_type(),
                error = %error,
                "event handler failed"
            );
            DispatchError::from(error)
        })
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}
