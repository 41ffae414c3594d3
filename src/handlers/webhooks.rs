//! # Webhook Handlers
//!
//! Inbound event endpoints for the signing and automation platforms. Both
//! accept a `{event, data}` envelope and always answer with a
//! [`WebhookResponse`]. A delivery only fails (500) when a handler hit a
//! dependency error; malformed or unrecognised events are acknowledged so the
//! sender does not retry them forever.

use axum::{body::Bytes, extract::State, http::StatusCode, response::Json};
use serde::{Deserialize, Serialize};
use tracing::{Instrument, error, info, info_span, warn};
use utoipa::ToSchema;

use crate::events::WebhookEnvelope;
use crate::models::Platform;
use crate::relay::Dispatch;
use crate::server::AppState;
use crate::telemetry::{self, TraceContext};

/// Webhook acknowledgement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct WebhookResponse {
    pub success: bool,
    /// Failure description, present only when `success` is false
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WebhookResponse {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

/// Receives signing-platform events
#[utoipa::path(
    post,
    path = "/api/webhooks/docuseal",
    params(
        ("X-Webhook-Signature" = Option<String>, Header, description = "Hex HMAC-SHA256 of the body; required when a DocuSeal webhook secret is configured")
    ),
    request_body(content = WebhookEnvelope, description = "Event envelope, e.g. `submission.completed`", content_type = "application/json"),
    responses(
        (status = 200, description = "Event handled, ignored or malformed", body = WebhookResponse),
        (status = 401, description = "Signature missing or invalid", body = WebhookResponse),
        (status = 500, description = "Handler failed", body = WebhookResponse)
    ),
    tag = "webhooks"
)]
pub async fn docuseal_webhook(
    State(state): State<AppState>,
    body: Bytes,
) -> (StatusCode, Json<WebhookResponse>) {
    receive(&state, Platform::Docuseal, body).await
}

/// Receives automation-platform events
#[utoipa::path(
    post,
    path = "/api/webhooks/n8n",
    params(
        ("X-Webhook-Signature" = Option<String>, Header, description = "Hex HMAC-SHA256 of the body; required when an n8n webhook secret is configured")
    ),
    request_body(content = WebhookEnvelope, description = "Event envelope, e.g. `workflow.completed`", content_type = "application/json"),
    responses(
        (status = 200, description = "Event handled, ignored or malformed", body = WebhookResponse),
        (status = 401, description = "Signature missing or invalid", body = WebhookResponse),
        (status = 500, description = "Handler failed", body = WebhookResponse)
    ),
    tag = "webhooks"
)]
pub async fn n8n_webhook(
    State(state): State<AppState>,
    body: Bytes,
) -> (StatusCode, Json<WebhookResponse>) {
    receive(&state, Platform::N8n, body).await
}

async fn receive(
    state: &AppState,
    platform: Platform,
    body: Bytes,
) -> (StatusCode, Json<WebhookResponse>) {
    let context = TraceContext::generate();
    let span = info_span!("webhook", %platform, trace_id = %context.trace_id);

    telemetry::with_trace_context(context, process(state, platform, body).instrument(span)).await
}

async fn process(
    state: &AppState,
    platform: Platform,
    body: Bytes,
) -> (StatusCode, Json<WebhookResponse>) {
    let envelope = match WebhookEnvelope::parse(&body) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!(error = %e, body_size = body.len(), "Malformed webhook envelope; acknowledging");
            record(platform, "malformed", "malformed");
            return (StatusCode::OK, Json(WebhookResponse::ok()));
        }
    };

    let event = envelope.event.clone();
    info!(event = %event, "Webhook received");

    match state.relay.dispatch(platform, envelope).await {
        Ok(Dispatch::Handled) => {
            record(platform, &event, Dispatch::Handled.as_str());
            (StatusCode::OK, Json(WebhookResponse::ok()))
        }
        Ok(Dispatch::Ignored) => {
            // Unbounded event names stay out of metric labels
            record(platform, "unrecognized", Dispatch::Ignored.as_str());
            (StatusCode::OK, Json(WebhookResponse::ok()))
        }
        Err(e) if e.is_invalid_payload() => {
            warn!(event = %event, error = %e, "Invalid event payload; acknowledging");
            record(platform, &event, "invalid");
            (StatusCode::OK, Json(WebhookResponse::ok()))
        }
        Err(e) => {
            error!(event = %event, error = %e, "Webhook handler failed");
            record(platform, &event, "failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(WebhookResponse::failure(e.to_string())),
            )
        }
    }
}

/// Counts one webhook delivery in `webhook_events_total`.
pub(crate) fn record(platform: Platform, event: &str, outcome: &'static str) {
    metrics::counter!(
        "webhook_events_total",
        "platform" => platform.as_str(),
        "event" => event.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}
