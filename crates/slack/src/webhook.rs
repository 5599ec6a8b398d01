//! Client for the automation endpoint that files requests and attachments.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use intake_core::config::{IntakeConfig, WebhookMode};
use intake_core::webhook::{WebhookPayload, WebhookReceipt};
use reqwest::Client;
use thiserror::Error;
use tracing::{info, warn};

use crate::background::BackgroundTasks;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WebhookError {
    #[error("webhook request failed: {0}")]
    Transport(String),
    #[error("webhook returned status {status}")]
    Status { status: u16 },
    #[error("webhook client could not be built: {0}")]
    Client(String),
}

#[async_trait]
pub trait AutomationWebhook: Send + Sync {
    async fn forward(&self, payload: &WebhookPayload) -> Result<WebhookReceipt, WebhookError>;
}

pub struct HttpAutomationWebhook {
    client: Client,
    url: String,
}

impl HttpAutomationWebhook {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, WebhookError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| WebhookError::Client(error.to_string()))?;
        Ok(Self { client, url: url.into() })
    }
}

#[async_trait]
impl AutomationWebhook for HttpAutomationWebhook {
    async fn forward(&self, payload: &WebhookPayload) -> Result<WebhookReceipt, WebhookError> {
        let response = self
            .client
            .post(&self.url)
            .json(payload)
            .send()
            .await
            .map_err(|error| WebhookError::Transport(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(WebhookError::Status { status: status.as_u16() });
        }

        // Apps Script deployments often answer with plain text.
        let body = response.text().await.unwrap_or_default();
        Ok(serde_json::from_str(&body).unwrap_or_default())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ForwardOutcome {
    /// No endpoint is configured.
    Skipped,
    Delivered(WebhookReceipt),
    Failed(WebhookError),
    /// Handed to the background scheduler; the result is logged there.
    Detached,
}

impl ForwardOutcome {
    pub fn folder_url(&self) -> Option<&str> {
        match self {
            Self::Delivered(receipt) => receipt.folder_url.as_deref(),
            _ => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// Applies the configured delivery mode around an optional [`AutomationWebhook`].
#[derive(Clone)]
pub struct WebhookForwarder {
    webhook: Option<Arc<dyn AutomationWebhook>>,
    mode: WebhookMode,
    background: BackgroundTasks,
    skipped: Arc<AtomicU64>,
}

impl WebhookForwarder {
    pub fn new(
        webhook: Option<Arc<dyn AutomationWebhook>>,
        mode: WebhookMode,
        background: BackgroundTasks,
    ) -> Self {
        Self { webhook, mode, background, skipped: Arc::new(AtomicU64::new(0)) }
    }

    pub fn disabled(background: BackgroundTasks) -> Self {
        Self::new(None, WebhookMode::Await, background)
    }

    pub fn from_config(
        config: &IntakeConfig,
        background: BackgroundTasks,
    ) -> Result<Self, WebhookError> {
        let webhook = match config.webhook_url.as_deref() {
            Some(url) => Some(Arc::new(HttpAutomationWebhook::new(
                url,
                Duration::from_secs(config.webhook_timeout_secs),
            )?) as Arc<dyn AutomationWebhook>),
            None => None,
        };
        Ok(Self::new(webhook, config.webhook_mode, background))
    }

    pub fn is_configured(&self) -> bool {
        self.webhook.is_some()
    }

    pub fn mode(&self) -> WebhookMode {
        self.mode
    }

    /// Forwards skipped because no endpoint is configured. Shared across clones.
    pub fn skipped_count(&self) -> u64 {
        self.skipped.load(Ordering::Relaxed)
    }

    pub async fn forward(&self, payload: WebhookPayload, correlation_id: &str) -> ForwardOutcome {
        let Some(webhook) = self.webhook.clone() else {
            self.skipped.fetch_add(1, Ordering::Relaxed);
            info!(
                event_name = "intake.webhook.skipped",
                correlation_id,
                payload_type = payload.kind(),
                "automation webhook not configured; skipping forward"
            );
            return ForwardOutcome::Skipped;
        };

        match self.mode {
            WebhookMode::Await => match deliver(webhook.as_ref(), &payload, correlation_id).await {
                Ok(receipt) => ForwardOutcome::Delivered(receipt),
                Err(error) => ForwardOutcome::Failed(error),
            },
            WebhookMode::Detached => {
                let correlation = correlation_id.to_owned();
                self.background.spawn_logged(
                    "webhook.forward",
                    correlation_id.to_owned(),
                    async move {
                        deliver(webhook.as_ref(), &payload, &correlation).await.map(|_| ())
                    },
                );
                ForwardOutcome::Detached
            }
        }
    }
}

async fn deliver(
    webhook: &dyn AutomationWebhook,
    payload: &WebhookPayload,
    correlation_id: &str,
) -> Result<WebhookReceipt, WebhookError> {
    match webhook.forward(payload).await {
        Ok(receipt) => {
            info!(
                event_name = "intake.webhook.delivered",
                correlation_id,
                payload_type = payload.kind(),
                thread_ts = payload.thread_ts(),
                folder_url = receipt.folder_url.as_deref().unwrap_or("none"),
                "forwarded payload to automation webhook"
            );
            Ok(receipt)
        }
        Err(error) => {
            warn!(
                event_name = "intake.webhook.failed",
                correlation_id,
                payload_type = payload.kind(),
                thread_ts = payload.thread_ts(),
                error = %error,
                "automation webhook call failed"
            );
            Err(error)
        }
    }
}
