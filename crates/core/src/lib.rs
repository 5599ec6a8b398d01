pub mod config;
pub mod domain;
pub mod flows;
pub mod webhook;

pub use domain::attachment::FileAttachment;
pub use domain::request::{Request, RequestType, ThreadRef, NOT_AVAILABLE, NOT_SELECTED};
pub use flows::{RequestEvent, RequestStage, StageTransition, StageTransitionError};
pub use webhook::{WebhookPayload, WebhookReceipt};
