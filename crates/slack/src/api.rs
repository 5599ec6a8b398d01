//! Slack Web API surface used by the intake handlers.
//!
//! Handlers only see the [`SlackApi`] trait so tests can substitute an
//! in-memory double; [`HttpSlackApi`] is the reqwest-backed implementation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::blocks::{Block, MessageTemplate, ModalView};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SlackApiError {
    #[error("slack `{method}` request failed: {message}")]
    Transport { method: &'static str, message: String },
    #[error("slack `{method}` returned error `{code}`")]
    Api { method: &'static str, code: String },
    #[error("slack `{method}` response could not be decoded: {message}")]
    Decode { method: &'static str, message: String },
    #[error("slack `{method}` response is missing `{field}`")]
    MissingField { method: &'static str, field: &'static str },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub channel: String,
    pub thread_ts: Option<String>,
    pub template: MessageTemplate,
}

impl OutgoingMessage {
    pub fn new(channel: impl Into<String>, template: MessageTemplate) -> Self {
        Self { channel: channel.into(), thread_ts: None, template }
    }

    pub fn in_thread(mut self, thread_ts: impl Into<String>) -> Self {
        self.thread_ts = Some(thread_ts.into());
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct PostedMessage {
    pub channel: String,
    pub ts: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileInfo {
    pub id: String,
    pub name: String,
    pub download_url: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserInfo {
    pub id: String,
    pub display_name: String,
}

#[async_trait]
pub trait SlackApi: Send + Sync {
    async fn open_modal(&self, trigger_id: &str, view: &ModalView) -> Result<(), SlackApiError>;
    async fn post_message(&self, message: &OutgoingMessage)
        -> Result<PostedMessage, SlackApiError>;
    async fn file_info(&self, file_id: &str) -> Result<FileInfo, SlackApiError>;
    async fn user_info(&self, user_id: &str) -> Result<UserInfo, SlackApiError>;
}

pub struct HttpSlackApi {
    client: Client,
    base_url: String,
    bot_token: SecretString,
}

impl HttpSlackApi {
    pub fn new(base_url: impl Into<String>, bot_token: SecretString) -> Result<Self, SlackApiError> {
        let client = Client::builder().timeout(DEFAULT_TIMEOUT).build().map_err(|error| {
            SlackApiError::Transport { method: "client.build", message: error.to_string() }
        })?;
        let base_url = base_url.into().trim_end_matches('/').to_owned();
        Ok(Self { client, base_url, bot_token })
    }

    fn url(&self, method: &str) -> String {
        format!("{}/{method}", self.base_url)
    }

    async fn post_json<B, T>(&self, method: &'static str, body: &B) -> Result<T, SlackApiError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let response = self
            .client
            .post(self.url(method))
            .bearer_auth(self.bot_token.expose_secret())
            .json(body)
            .send()
            .await
            .map_err(|error| SlackApiError::Transport { method, message: error.to_string() })?;
        decode_response(method, response).await
    }

    async fn get_query<T>(
        &self,
        method: &'static str,
        query: &[(&str, &str)],
    ) -> Result<T, SlackApiError>
    where
        T: DeserializeOwned,
    {
        let response = self
            .client
            .get(self.url(method))
            .bearer_auth(self.bot_token.expose_secret())
            .query(query)
            .send()
            .await
            .map_err(|error| SlackApiError::Transport { method, message: error.to_string() })?;
        decode_response(method, response).await
    }
}

async fn decode_response<T>(
    method: &'static str,
    response: reqwest::Response,
) -> Result<T, SlackApiError>
where
    T: DeserializeOwned,
{
    let status = response.status();
    let body: Value = response.json().await.map_err(|error| SlackApiError::Decode {
        method,
        message: format!("status {status}: {error}"),
    })?;

    if !body.get("ok").and_then(Value::as_bool).unwrap_or(false) {
        let code = body.get("error").and_then(Value::as_str).unwrap_or("unknown_error");
        return Err(SlackApiError::Api { method, code: code.to_owned() });
    }

    debug!(method, "slack api call succeeded");
    serde_json::from_value(body)
        .map_err(|error| SlackApiError::Decode { method, message: error.to_string() })
}

#[derive(Serialize)]
struct OpenViewRequest<'a> {
    trigger_id: &'a str,
    view: &'a ModalView,
}

#[derive(Serialize)]
struct PostMessageRequest<'a> {
    channel: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    thread_ts: Option<&'a str>,
    #[serde(skip_serializing_if = "no_blocks")]
    blocks: &'a [Block],
}

fn no_blocks(blocks: &&[Block]) -> bool {
    blocks.is_empty()
}

#[derive(Deserialize)]
struct Ignored {}

#[derive(Deserialize)]
struct FileInfoResponse {
    file: FileObject,
}

#[derive(Deserialize)]
struct FileObject {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    url_private_download: Option<String>,
    #[serde(default)]
    url_private: Option<String>,
}

#[derive(Deserialize)]
struct UserInfoResponse {
    user: UserObject,
}

#[derive(Deserialize)]
struct UserObject {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    real_name: Option<String>,
    #[serde(default)]
    profile: Option<UserProfile>,
}

#[derive(Deserialize)]
struct UserProfile {
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    real_name: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

impl UserObject {
    fn into_user_info(self) -> UserInfo {
        let (profile_display, profile_real) = match self.profile {
            Some(profile) => (profile.display_name, profile.real_name),
            None => (None, None),
        };
        let display_name = non_blank(profile_display)
            .or_else(|| non_blank(profile_real))
            .or_else(|| non_blank(self.real_name))
            .or_else(|| non_blank(self.name))
            .unwrap_or_else(|| self.id.clone());
        UserInfo { id: self.id, display_name }
    }
}

#[async_trait]
impl SlackApi for HttpSlackApi {
    async fn open_modal(&self, trigger_id: &str, view: &ModalView) -> Result<(), SlackApiError> {
        let _: Ignored =
            self.post_json("views.open", &OpenViewRequest { trigger_id, view }).await?;
        Ok(())
    }

    async fn post_message(
        &self,
        message: &OutgoingMessage,
    ) -> Result<PostedMessage, SlackApiError> {
        self.post_json(
            "chat.postMessage",
            &PostMessageRequest {
                channel: &message.channel,
                text: &message.template.fallback_text,
                thread_ts: message.thread_ts.as_deref(),
                blocks: &message.template.blocks,
            },
        )
        .await
    }

    async fn file_info(&self, file_id: &str) -> Result<FileInfo, SlackApiError> {
        let response: FileInfoResponse = self.get_query("files.info", &[("file", file_id)]).await?;
        let file = response.file;
        let download_url = file
            .url_private_download
            .or(file.url_private)
            .ok_or(SlackApiError::MissingField {
                method: "files.info",
                field: "url_private_download",
            })?;
        let name = non_blank(file.name).or(file.title).unwrap_or_else(|| file.id.clone());
        Ok(FileInfo { id: file.id, name, download_url })
    }

    async fn user_info(&self, user_id: &str) -> Result<UserInfo, SlackApiError> {
        let response: UserInfoResponse = self.get_query("users.info", &[("user", user_id)]).await?;
        Ok(response.user.into_user_info())
    }
}
