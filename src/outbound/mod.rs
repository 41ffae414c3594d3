//! # Outbound Client
//!
//! Requests this service makes to the two external platforms. Every operation
//! is a single authenticated HTTP call: no retries, no timeout override and no
//! response caching. Failures are returned to the caller untouched.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value as JsonValue};

use crate::events::{ExternalId, Submission};
use crate::models::Platform;

mod http;

pub use http::HttpOutboundClient;

/// Longest upstream body excerpt kept in error messages, in characters.
const BODY_SNIPPET_CHARS: usize = 200;

/// Errors returned by outbound platform calls.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("{platform} returned HTTP {status}{}", .body.as_deref().map(|b| format!(": {}", b)).unwrap_or_default())]
    Http {
        platform: Platform,
        status: u16,
        body: Option<String>,
    },

    #[error("network error calling {platform}: {source}")]
    Network {
        platform: Platform,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to decode {platform} response: {source}")]
    Decode {
        platform: Platform,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid {platform} url '{url}': {reason}")]
    InvalidUrl {
        platform: Platform,
        url: String,
        reason: String,
    },

    #[error("failed to build HTTP client: {0}")]
    Build(#[source] reqwest::Error),
}

impl ClientError {
    /// Platform the failing call was addressed to, when known.
    pub fn platform(&self) -> Option<Platform> {
        match self {
            ClientError::Http { platform, .. }
            | ClientError::Network { platform, .. }
            | ClientError::Decode { platform, .. }
            | ClientError::InvalidUrl { platform, .. } => Some(*platform),
            ClientError::Build(_) => None,
        }
    }
}

/// Truncates an upstream body on a character boundary.
pub(crate) fn body_snippet(body: &str) -> Option<String> {
    let body = body.trim();
    if body.is_empty() {
        return None;
    }
    if body.chars().count() > BODY_SNIPPET_CHARS {
        let truncated: String = body.chars().take(BODY_SNIPPET_CHARS).collect();
        Some(format!("{}...", truncated))
    } else {
        Some(body.to_string())
    }
}

/// Recipient of a new signing-platform submission.
#[derive(Debug, Clone, Serialize)]
pub struct Submitter {
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Body of a create-submission request.
#[derive(Debug, Clone, Serialize)]
pub struct NewSubmission {
    pub submitter: Submitter,
    pub fields: JsonValue,
    pub metadata: Map<String, JsonValue>,
}

/// Reads the submission identifier out of a create-submission response.
///
/// The platform answers either with the submission object or with the list of
/// created submitters, each carrying `submission_id`.
pub fn created_submission_id(created: &JsonValue) -> Option<ExternalId> {
    match created {
        JsonValue::Array(submitters) => submitters.first().and_then(|first| {
            first
                .get("submission_id")
                .or_else(|| first.get("id"))
                .and_then(ExternalId::from_json)
        }),
        JsonValue::Object(object) => object
            .get("submission_id")
            .or_else(|| object.get("id"))
            .and_then(ExternalId::from_json),
        _ => None,
    }
}

/// The four platform operations the relay and the document API depend on.
#[async_trait]
pub trait OutboundClient: Send + Sync {
    /// `GET {docuseal}/api/submissions/{id}`
    async fn get_submission(&self, id: &ExternalId) -> Result<Submission, ClientError>;

    /// `POST {docuseal}/api/templates/{template_id}/submissions`
    async fn create_submission(
        &self,
        template_id: &str,
        submission: &NewSubmission,
    ) -> Result<JsonValue, ClientError>;

    /// `POST {n8n}/api/v1/workflows/{workflow_id}`
    async fn trigger_workflow(
        &self,
        workflow_id: &str,
        data: &JsonValue,
    ) -> Result<JsonValue, ClientError>;

    /// `POST {n8n}{path}` without authentication
    async fn send_webhook(&self, path: &str, data: &JsonValue) -> Result<(), ClientError>;
}
