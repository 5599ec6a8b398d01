use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

pub const LIVENESS_TEXT: &str = "legal-intake bot is running ✅";

#[derive(Clone)]
pub struct HealthState {
    webhook_configured: bool,
}

impl HealthState {
    pub fn new(webhook_configured: bool) -> Self {
        Self { webhook_configured }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub webhook: HealthCheck,
    pub checked_at: String,
}

pub fn router(state: HealthState) -> Router {
    Router::new().route("/", get(liveness)).route("/health", get(health)).with_state(state)
}

pub async fn liveness() -> &'static str {
    LIVENESS_TEXT
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let webhook = if state.webhook_configured {
        HealthCheck { status: "configured", detail: "automation webhook forwarding enabled".to_string() }
    } else {
        HealthCheck {
            status: "disabled",
            detail: "no webhook url configured; forwarding is skipped".to_string(),
        }
    };

    let payload = HealthResponse {
        status: "ready",
        service: HealthCheck {
            status: "ready",
            detail: "legal-intake receiver initialized".to_string(),
        },
        webhook,
        checked_at: Utc::now().to_rfc3339(),
    };

    (StatusCode::OK, Json(payload))
}
