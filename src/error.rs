//! # Error Handling
//!
//! Problem+json responses for the document API. Webhook endpoints answer with
//! their own `{success, error}` envelope and do not use [`ApiError`].

use axum::{
    extract::rejection::JsonRejection,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;

use crate::outbound::{ClientError, body_snippet};
use crate::repositories::StoreError;
use crate::telemetry;

/// Unified API error response structure
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    #[serde(skip_serializing, skip_deserializing)]
    pub status: StatusCode,
    /// Error code for programmatic handling (SCREAMING_SNAKE_CASE)
    pub code: Box<str>,
    /// Human-readable error message
    pub message: Box<str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub details: Option<Box<serde_json::Value>>,
    /// Correlation trace ID for debugging
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<Box<str>>,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &str, message: &str) -> Self {
        Self {
            status,
            code: code.into(),
            message: message.into(),
            details: None,
            trace_id: Self::current_trace_id(),
        }
    }

    pub fn with_details<V: Into<serde_json::Value>>(mut self, details: V) -> Self {
        self.details = Some(Box::new(details.into()));
        self
    }

    /// Trace id of the running request, or a short correlation id when the
    /// error is raised outside a trace context.
    fn current_trace_id() -> Option<Box<str>> {
        let trace_id = telemetry::current_trace_id()
            .unwrap_or_else(|| format!("corr-{}", &uuid::Uuid::new_v4().simple().to_string()[..8]));
        Some(trace_id.into_boxed_str())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status;
        let mut response = (status, axum::Json(self)).into_response();
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/problem+json"),
        );
        response
    }
}

/// Upstream platform failure, attached as `details` of a `PROVIDER_ERROR`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProviderError {
    /// Platform identifier (`docuseal` or `n8n`)
    pub provider: String,
    /// HTTP status from upstream, absent for transport failures
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    /// Truncated upstream response body
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body_snippet: Option<String>,
}

/// Upstream failure → 502 `PROVIDER_ERROR`, whatever the upstream status was.
pub fn provider_error(provider: &str, status: Option<u16>, body: Option<&str>) -> ApiError {
    let message = match status {
        Some(status) => format!("Provider {} returned error status {}", provider, status),
        None => format!("Provider {} could not be reached", provider),
    };
    let details = ProviderError {
        provider: provider.to_string(),
        status,
        body_snippet: body.and_then(body_snippet),
    };

    ApiError::new(StatusCode::BAD_GATEWAY, "PROVIDER_ERROR", &message).with_details(json!(details))
}

pub fn validation_error(message: &str, field_errors: serde_json::Value) -> ApiError {
    ApiError::new(StatusCode::BAD_REQUEST, "VALIDATION_FAILED", message).with_details(field_errors)
}

pub fn not_found(message: &str) -> ApiError {
    ApiError::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
}

impl From<anyhow::Error> for ApiError {
    fn from(error: anyhow::Error) -> Self {
        tracing::error!("Internal error: {:?}", error);
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_SERVER_ERROR",
            "An internal error occurred",
        )
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        let message = match rejection {
            JsonRejection::JsonDataError(err) => format!("Invalid JSON: {}", err.body_text()),
            JsonRejection::JsonSyntaxError(err) => format!("JSON syntax error: {}", err.body_text()),
            JsonRejection::MissingJsonContentType(_) => {
                "Missing 'Content-Type: application/json' header".to_string()
            }
            _ => "Invalid request body".to_string(),
        };
        Self::new(StatusCode::BAD_REQUEST, "VALIDATION_FAILED", &message)
    }
}

impl From<sea_orm::DbErr> for ApiError {
    fn from(error: sea_orm::DbErr) -> Self {
        match error {
            sea_orm::DbErr::RecordNotFound(record) => {
                not_found(&format!("Record not found: {}", record))
            }
            sea_orm::DbErr::Conn(connection_err) => {
                tracing::error!("Database connection error: {:?}", connection_err);
                Self::new(
                    StatusCode::SERVICE_UNAVAILABLE,
                    "SERVICE_UNAVAILABLE",
                    "Database service unavailable",
                )
            }
            other => {
                tracing::error!("Database error: {:?}", other);
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_SERVER_ERROR",
                    "Database error occurred",
                )
            }
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::NotFound { document_id } => {
                not_found(&format!("Document '{}' not found", document_id))
            }
            StoreError::Contended { document_id } => Self::new(
                StatusCode::CONFLICT,
                "CONFLICT",
                &format!("Document '{}' is being updated concurrently", document_id),
            ),
            StoreError::Database(db_err) => db_err.into(),
        }
    }
}

impl From<ClientError> for ApiError {
    fn from(error: ClientError) -> Self {
        tracing::warn!(error = %error, "Upstream platform call failed");
        match &error {
            ClientError::Http {
                platform,
                status,
                body,
            } => provider_error(platform.as_str(), Some(*status), body.as_deref()),
            ClientError::Network { platform, .. } | ClientError::Decode { platform, .. } => {
                provider_error(platform.as_str(), None, Some(&error.to_string()))
            }
            ClientError::InvalidUrl { .. } | ClientError::Build(_) => Self::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_SERVER_ERROR",
                "Outbound client is misconfigured",
            ),
        }
    }
}
