//! Payload shapes accepted by the automation endpoint.
//!
//! Both shapes are posted as JSON to the same URL and distinguished by `type`.

use serde::{Deserialize, Serialize};

use crate::domain::attachment::FileAttachment;
use crate::domain::request::{Request, ThreadRef};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WebhookPayload {
    NewRequest {
        #[serde(rename = "requestType")]
        request_type: String,
        counterparty: String,
        description: String,
        #[serde(rename = "submittedBy")]
        submitted_by: String,
        channel: String,
        thread_ts: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<String>,
    },
    FileUpload {
        channel: String,
        thread_ts: String,
        #[serde(rename = "fileName")]
        file_name: String,
        #[serde(rename = "fileUrl")]
        file_url: String,
    },
}

impl WebhookPayload {
    pub fn new_request(request: &Request, thread: &ThreadRef) -> Self {
        Self::NewRequest {
            request_type: request.request_type.clone(),
            counterparty: request.counterparty.clone(),
            description: request.description.clone(),
            submitted_by: request.submitted_by.clone(),
            channel: thread.channel_id.clone(),
            thread_ts: thread.thread_ts.clone(),
            timestamp: Some(request.created_at.to_rfc3339()),
        }
    }

    pub fn file_upload(attachment: &FileAttachment) -> Self {
        Self::FileUpload {
            channel: attachment.thread.channel_id.clone(),
            thread_ts: attachment.thread.thread_ts.clone(),
            file_name: attachment.file_name.clone(),
            file_url: attachment.download_url.clone(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::NewRequest { .. } => "new_request",
            Self::FileUpload { .. } => "file_upload",
        }
    }

    pub fn thread_ts(&self) -> &str {
        match self {
            Self::NewRequest { thread_ts, .. } | Self::FileUpload { thread_ts, .. } => thread_ts,
        }
    }
}

/// Optional response body. Only `folderUrl` is consumed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct WebhookReceipt {
    #[serde(default, rename = "folderUrl")]
    pub folder_url: Option<String>,
}
