use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Substituted when the request type select carries no selection.
pub const NOT_SELECTED: &str = "not selected";
/// Substituted when a free-text field is absent or blank.
pub const NOT_AVAILABLE: &str = "N/A";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestType {
    Procurement,
    RevenueCollaboration,
    Other,
}

impl RequestType {
    pub const ALL: [RequestType; 3] =
        [RequestType::Procurement, RequestType::RevenueCollaboration, RequestType::Other];

    /// Option value as submitted by the form and forwarded to the automation endpoint.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Procurement => "Procurement",
            Self::RevenueCollaboration => "Revenue / Collaboration",
            Self::Other => "Other",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ThreadRef {
    pub channel_id: String,
    pub thread_ts: String,
}

impl ThreadRef {
    pub fn new(channel_id: impl Into<String>, thread_ts: impl Into<String>) -> Self {
        Self { channel_id: channel_id.into(), thread_ts: thread_ts.into() }
    }
}

/// One form submission. Lives only for the duration of the handler that created it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    /// Raw option value, or [`NOT_SELECTED`]. Values outside [`RequestType::ALL`]
    /// are kept verbatim.
    pub request_type: String,
    pub counterparty: String,
    pub description: String,
    pub submitted_by: String,
    pub submitter_id: String,
    pub origin_channel_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Returns the value as submitted, or `placeholder` when absent or blank.
pub fn value_or_placeholder(value: Option<&str>, placeholder: &str) -> String {
    match value {
        Some(value) if !value.trim().is_empty() => value.to_owned(),
        _ => placeholder.to_owned(),
    }
}
