//! Inbound webhook payloads.
//!
//! Both platforms post `{event, data}` envelopes. The envelope is parsed
//! first; `data` is only deserialised into the event-specific struct by the
//! handler that owns the event.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value as JsonValue};
use utoipa::ToSchema;

/// Webhook envelope shared by both platforms.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct WebhookEnvelope {
    /// Event name, e.g. `submission.completed`
    pub event: String,
    /// Event-specific payload (opaque at this level)
    #[serde(default)]
    #[schema(value_type = Object)]
    pub data: JsonValue,
}

impl WebhookEnvelope {
    pub fn parse(body: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(body)
    }
}

/// Identifier issued by an external platform.
///
/// Platforms send these either as JSON strings or numbers; both are
/// normalised to their string form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExternalId(String);

impl ExternalId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Reads an identifier out of an arbitrary JSON value, ignoring empty strings.
    pub fn from_json(value: &JsonValue) -> Option<Self> {
        match value {
            JsonValue::String(text) if !text.trim().is_empty() => Some(Self(text.clone())),
            JsonValue::Number(number) => Some(Self(number.to_string())),
            _ => None,
        }
    }
}

impl fmt::Display for ExternalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for ExternalId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ExternalId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = JsonValue::deserialize(deserializer)?;
        ExternalId::from_json(&value).ok_or_else(|| {
            serde::de::Error::custom(format!(
                "expected a non-empty string or number identifier, got {}",
                value
            ))
        })
    }
}

/// `data` of `submission.completed` / `submission.opened`.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmissionEvent {
    /// External submission identifier
    pub id: ExternalId,
}

/// `data` of `workflow.completed`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowCompleted {
    pub workflow_id: String,
    #[serde(default)]
    pub execution_id: Option<ExternalId>,
    #[serde(default)]
    pub result: Option<JsonValue>,
}

/// `result` of the `form-submission-processor` workflow.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormProcessingResult {
    pub document_id: ExternalId,
    #[serde(default)]
    pub form_type: Option<String>,
    pub status: String,
}

/// Submission record as returned by the signing platform.
///
/// Only the fields the relay reasons about are typed; everything else is kept
/// in `extra` so the record is forwarded unchanged.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Submission {
    pub id: ExternalId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_id: Option<ExternalId>,
    #[serde(default, deserialize_with = "map_or_null")]
    pub metadata: Map<String, JsonValue>,
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

fn map_or_null<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Map<String, JsonValue>, D::Error> {
    Ok(Option::<Map<String, JsonValue>>::deserialize(deserializer)?.unwrap_or_default())
}

impl Submission {
    /// Template the submission was created from, falling back to the nested
    /// `template.id` some API versions return.
    pub fn template_id(&self) -> Option<ExternalId> {
        self.template_id.clone().or_else(|| {
            self.extra
                .get("template")
                .and_then(|template| template.get("id"))
                .and_then(ExternalId::from_json)
        })
    }

    /// Internal document this submission was created for, if it was tagged.
    pub fn document_id(&self) -> Option<ExternalId> {
        self.metadata.get("documentId").and_then(ExternalId::from_json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_without_data_defaults_to_null() {
        let envelope = WebhookEnvelope::parse(br#"{"event":"submission.opened"}"#).unwrap();
        assert_eq!(envelope.event, "submission.opened");
        assert!(envelope.data.is_null());
    }

    #[test]
    fn test_envelope_requires_event() {
        assert!(WebhookEnvelope::parse(br#"{"data":{}}"#).is_err());
        assert!(WebhookEnvelope::parse(b"not json").is_err());
    }

    #[test]
    fn test_external_id_accepts_numbers_and_strings() {
        let numeric: SubmissionEvent = serde_json::from_value(json!({"id": 42})).unwrap();
        assert_eq!(numeric.id.as_str(), "42");

        let text: SubmissionEvent = serde_json::from_value(json!({"id": "sub_9"})).unwrap();
        assert_eq!(text.id.as_str(), "sub_9");

        assert!(serde_json::from_value::<SubmissionEvent>(json!({"id": ""})).is_err());
        assert!(serde_json::from_value::<SubmissionEvent>(json!({})).is_err());
    }

    #[test]
    fn test_submission_template_and_document_lookup() {
        let submission: Submission = serde_json::from_value(json!({
            "id": 7,
            "template": {"id": 3, "name": "Order form"},
            "metadata": {"documentId": "D1"},
            "status": "completed"
        }))
        .unwrap();

        assert_eq!(submission.template_id(), Some(ExternalId::new("3")));
        assert_eq!(submission.document_id(), Some(ExternalId::new("D1")));

        // Untyped fields survive re-serialisation
        let forwarded = serde_json::to_value(&submission).unwrap();
        assert_eq!(forwarded["status"], "completed");
        assert_eq!(forwarded["template"]["name"], "Order form");
    }

    #[test]
    fn test_submission_without_metadata() {
        let submission: Submission =
            serde_json::from_value(json!({"id": "s1", "template_id": "2", "metadata": null}))
                .unwrap();
        assert_eq!(submission.template_id(), Some(ExternalId::new("2")));
        assert_eq!(submission.document_id(), None);
    }

    #[test]
    fn test_workflow_completed_payload() {
        let event: WorkflowCompleted = serde_json::from_value(json!({
            "workflowId": "form-submission-processor",
            "executionId": 991,
            "result": {"documentId": "D2", "formType": "order", "status": "approved"}
        }))
        .unwrap();
        assert_eq!(event.workflow_id, "form-submission-processor");

        let result: FormProcessingResult = serde_json::from_value(event.result.unwrap()).unwrap();
        assert_eq!(result.document_id.as_str(), "D2");
        assert_eq!(result.status, "approved");
    }
}
