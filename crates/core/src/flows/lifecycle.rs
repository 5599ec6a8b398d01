use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Per-request progress. Nothing is persisted; handlers use the stage to tag
/// log events and to reject out-of-order steps.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStage {
    Idle,
    CommandReceived,
    FormOpen,
    Submitted,
    Notified,
    ThreadOpenForAttachments,
}

impl RequestStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::CommandReceived => "command_received",
            Self::FormOpen => "form_open",
            Self::Submitted => "submitted",
            Self::Notified => "notified",
            Self::ThreadOpenForAttachments => "thread_open_for_attachments",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestEvent {
    CommandInvoked,
    ModalOpened,
    FormSubmitted,
    SummaryPosted,
    AttachmentShared,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StageTransition {
    pub from: RequestStage,
    pub to: RequestStage,
    pub event: RequestEvent,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("event {event:?} is not valid in stage {from:?}")]
pub struct StageTransitionError {
    pub from: RequestStage,
    pub event: RequestEvent,
}

impl RequestStage {
    pub fn apply(self, event: RequestEvent) -> Result<StageTransition, StageTransitionError> {
        use RequestEvent::*;
        use RequestStage::*;

        let to = match (self, event) {
            (Idle, CommandInvoked) => CommandReceived,
            (CommandReceived, ModalOpened) => FormOpen,
            // Submissions arrive in a separate event; the form-open step is
            // implied whenever the platform delivers one.
            (Idle | FormOpen, FormSubmitted) => Submitted,
            (Submitted, SummaryPosted) => Notified,
            // Files arrive on their own events, so a known thread is enough.
            (Idle | Notified | ThreadOpenForAttachments, AttachmentShared) => {
                ThreadOpenForAttachments
            }
            (from, event) => return Err(StageTransitionError { from, event }),
        };

        Ok(StageTransition { from: self, to, event })
    }
}
