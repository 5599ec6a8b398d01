//! Signed Slack HTTP endpoint.
//!
//! Each verified envelope is dispatched on the background scheduler; the
//! HTTP 200 is returned once the handler acknowledges (or the ack window
//! closes), so the reply to Slack always precedes the handler's outbound I/O.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::State,
    http::{header::CONTENT_TYPE, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use chrono::Utc;
use intake_slack::{
    background::BackgroundTasks,
    events::{Acknowledger, EventContext, EventDispatcher, SlackEnvelope},
    ingress::{parse_request, Inbound},
    signature::{verify_signature, SIGNATURE_HEADER, TIMESTAMP_HEADER},
};
use secrecy::SecretString;
use serde_json::json;
use tracing::{debug, info, warn};

pub const ACK_WINDOW: Duration = Duration::from_millis(2_500);

#[derive(Clone)]
pub struct ReceiverState {
    signing_secret: SecretString,
    dispatcher: Arc<EventDispatcher>,
    background: BackgroundTasks,
    ack_window: Duration,
}

impl ReceiverState {
    pub fn new(
        signing_secret: SecretString,
        dispatcher: Arc<EventDispatcher>,
        background: BackgroundTasks,
    ) -> Self {
        Self { signing_secret, dispatcher, background, ack_window: ACK_WINDOW }
    }
}

pub fn router(events_path: &str, state: ReceiverState) -> Router {
    Router::new().route(events_path, post(receive)).with_state(state)
}

pub async fn receive(
    State(state): State<ReceiverState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let header = |name: &str| headers.get(name).and_then(|value| value.to_str().ok());

    if let Err(error) = verify_signature(
        &state.signing_secret,
        header(TIMESTAMP_HEADER),
        header(SIGNATURE_HEADER),
        &body,
        Utc::now(),
    ) {
        warn!(
            event_name = "ingress.slack.signature_rejected",
            correlation_id = "unverified",
            error = %error,
            "rejected unsigned or stale slack request"
        );
        return (StatusCode::UNAUTHORIZED, "invalid signature").into_response();
    }

    let inbound = match parse_request(header(CONTENT_TYPE.as_str()), &body) {
        Ok(inbound) => inbound,
        Err(error) => {
            warn!(
                event_name = "ingress.slack.malformed",
                correlation_id = "unparsed",
                error = %error,
                "could not decode slack request body"
            );
            return (StatusCode::BAD_REQUEST, "malformed request").into_response();
        }
    };

    match inbound {
        Inbound::UrlVerification { challenge } => {
            info!(
                event_name = "ingress.slack.url_verification",
                correlation_id = "url_verification",
                "answered events api url verification"
            );
            Json(json!({ "challenge": challenge })).into_response()
        }
        Inbound::Envelope(envelope) => {
            acknowledge_after_dispatch(&state, envelope).await;
            StatusCode::OK.into_response()
        }
    }
}

async fn acknowledge_after_dispatch(state: &ReceiverState, envelope: SlackEnvelope) {
    let envelope_id = envelope.envelope_id.clone();
    info!(
        event_name = "ingress.slack.envelope_received",
        envelope_id = %envelope_id,
        event_type = ?envelope.event.event_type(),
        correlation_id = %envelope_id,
        "received slack envelope"
    );

    let (ack, acked) = Acknowledger::new();
    let ctx = EventContext::new(envelope_id.clone(), Arc::new(ack));
    let dispatcher = Arc::clone(&state.dispatcher);
    state.background.spawn_logged("slack.dispatch", envelope_id.clone(), async move {
        dispatcher.dispatch(&envelope, &ctx).await.map(|_| ())
    });

    match tokio::time::timeout(state.ack_window, acked).await {
        Ok(Ok(())) => debug!(
            event_name = "ingress.slack.ack_sent",
            envelope_id = %envelope_id,
            correlation_id = %envelope_id,
            "acknowledged slack envelope"
        ),
        Ok(Err(_)) => warn!(
            event_name = "ingress.slack.ack_sent",
            envelope_id = %envelope_id,
            correlation_id = %envelope_id,
            "dispatch ended without acknowledging; replying anyway"
        ),
        Err(_) => warn!(
            event_name = "ingress.slack.ack_sent",
            envelope_id = %envelope_id,
            correlation_id = %envelope_id,
            window_ms = state.ack_window.as_millis() as u64,
            "handler did not acknowledge within the ack window; replying anyway"
        ),
    }
}
