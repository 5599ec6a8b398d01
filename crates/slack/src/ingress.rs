//! Decodes inbound Slack HTTP bodies into [`SlackEnvelope`]s.
//!
//! Three body shapes share one endpoint:
//! - slash commands: form-encoded, `command=...`
//! - interactions: form-encoded, a single `payload=<json>` field
//! - Events API: JSON, either `url_verification` or `event_callback`

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::{
    commands::SlashCommandPayload,
    events::{MessageEvent, SharedFile, SlackEnvelope, SlackEvent, ViewSubmissionEvent},
    form::ViewState,
};

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
const JSON_CONTENT_TYPE: &str = "application/json";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Inbound {
    UrlVerification { challenge: String },
    Envelope(SlackEnvelope),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IngressError {
    #[error("unsupported content type `{0}`")]
    UnsupportedContentType(String),
    #[error("form body could not be decoded: {0}")]
    Form(String),
    #[error("json body could not be decoded: {0}")]
    Json(String),
    #[error("form body is neither a slash command nor an interaction payload")]
    UnrecognizedForm,
    #[error("required field `{0}` is missing")]
    MissingField(&'static str),
}

pub fn parse_request(content_type: Option<&str>, body: &[u8]) -> Result<Inbound, IngressError> {
    let content_type = content_type.unwrap_or_default();
    let mime = content_type.split(';').next().unwrap_or_default().trim();

    if mime.eq_ignore_ascii_case(FORM_CONTENT_TYPE) {
        parse_form(body)
    } else if mime.eq_ignore_ascii_case(JSON_CONTENT_TYPE) {
        parse_events_api(body)
    } else {
        Err(IngressError::UnsupportedContentType(content_type.to_owned()))
    }
}

fn parse_form(body: &[u8]) -> Result<Inbound, IngressError> {
    let mut fields: HashMap<String, String> =
        serde_urlencoded::from_bytes(body).map_err(|error| IngressError::Form(error.to_string()))?;

    if let Some(payload) = fields.remove("payload") {
        return parse_interaction(&payload);
    }
    if fields.contains_key("command") {
        return slash_command(fields);
    }
    Err(IngressError::UnrecognizedForm)
}

fn slash_command(mut fields: HashMap<String, String>) -> Result<Inbound, IngressError> {
    let mut required = |name: &'static str| {
        fields.remove(name).filter(|value| !value.is_empty()).ok_or(IngressError::MissingField(name))
    };
    let command = required("command")?;
    let channel_id = required("channel_id")?;
    let user_id = required("user_id")?;
    let trigger_id = required("trigger_id")?;

    let payload = SlashCommandPayload {
        command,
        text: fields.remove("text").unwrap_or_default(),
        channel_id,
        user_id,
        user_name: fields.remove("user_name"),
        trigger_id: trigger_id.clone(),
        response_url: fields.remove("response_url"),
    };
    Ok(Inbound::Envelope(SlackEnvelope {
        envelope_id: trigger_id,
        event: SlackEvent::SlashCommand(payload),
    }))
}

#[derive(Deserialize)]
struct InteractionPayload {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    user: Option<InteractionUser>,
    #[serde(default)]
    view: Option<ViewPayload>,
}

#[derive(Deserialize)]
struct InteractionUser {
    id: String,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Deserialize)]
struct ViewPayload {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    callback_id: String,
    #[serde(default)]
    private_metadata: Option<String>,
    #[serde(default)]
    state: ViewStatePayload,
}

#[derive(Default, Deserialize)]
struct ViewStatePayload {
    #[serde(default)]
    values: ViewState,
}

fn parse_interaction(raw: &str) -> Result<Inbound, IngressError> {
    let payload: InteractionPayload =
        serde_json::from_str(raw).map_err(|error| IngressError::Json(error.to_string()))?;

    if payload.kind != "view_submission" {
        return Ok(unsupported(payload.kind, None));
    }
    let view = payload.view.ok_or(IngressError::MissingField("view"))?;
    let user = payload.user.ok_or(IngressError::MissingField("user"))?;

    let event = ViewSubmissionEvent {
        callback_id: view.callback_id,
        user_id: user.id,
        user_name: user.username.or(user.name),
        private_metadata: view.private_metadata,
        state: view.state.values,
    };
    Ok(Inbound::Envelope(SlackEnvelope {
        envelope_id: view.id.unwrap_or_else(generated_id),
        event: SlackEvent::ViewSubmission(event),
    }))
}

#[derive(Deserialize)]
#[serde(tag = "type")]
enum EventsApiBody {
    #[serde(rename = "url_verification")]
    UrlVerification { challenge: String },
    #[serde(rename = "event_callback")]
    EventCallback {
        #[serde(default)]
        event_id: Option<String>,
        event: Value,
    },
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
struct RawMessageEvent {
    channel: Option<String>,
    #[serde(default)]
    user: Option<String>,
    #[serde(default)]
    subtype: Option<String>,
    #[serde(default)]
    thread_ts: Option<String>,
    #[serde(default)]
    files: Vec<RawFile>,
}

#[derive(Deserialize)]
struct RawFile {
    id: String,
    #[serde(default)]
    name: Option<String>,
}

fn parse_events_api(body: &[u8]) -> Result<Inbound, IngressError> {
    let parsed: EventsApiBody =
        serde_json::from_slice(body).map_err(|error| IngressError::Json(error.to_string()))?;

    match parsed {
        EventsApiBody::UrlVerification { challenge } => Ok(Inbound::UrlVerification { challenge }),
        EventsApiBody::EventCallback { event_id, event } => {
            let kind = event.get("type").and_then(Value::as_str).unwrap_or("unknown").to_owned();
            if kind != "message" {
                return Ok(unsupported(kind, event_id));
            }

            let raw: RawMessageEvent = serde_json::from_value(event)
                .map_err(|error| IngressError::Json(error.to_string()))?;
            let channel_id = raw.channel.ok_or(IngressError::MissingField("event.channel"))?;
            let message = MessageEvent {
                channel_id,
                user_id: raw.user,
                subtype: raw.subtype,
                thread_ts: raw.thread_ts,
                files: raw
                    .files
                    .into_iter()
                    .map(|file| SharedFile { id: file.id, name: file.name })
                    .collect(),
            };
            Ok(Inbound::Envelope(SlackEnvelope {
                envelope_id: event_id.unwrap_or_else(generated_id),
                event: SlackEvent::Message(message),
            }))
        }
        EventsApiBody::Other => Ok(unsupported("unknown".to_owned(), None)),
    }
}

fn unsupported(event_type: String, envelope_id: Option<String>) -> Inbound {
    Inbound::Envelope(SlackEnvelope {
        envelope_id: envelope_id.unwrap_or_else(generated_id),
        event: SlackEvent::Unsupported { event_type },
    })
}

fn generated_id() -> String {
    Uuid::new_v4().to_string()
}
