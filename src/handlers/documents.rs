//! # Document API Handlers
//!
//! Intake of portal form posts. A new document starts `pending`; when a
//! signature is requested it is sent to the signing platform under the
//! template of its form type and linked to the resulting submission. The
//! automation platform is told about every new document.

use std::sync::Arc;

use axum::{
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue, json};
use tracing::{Instrument, info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{ApiError, not_found, validation_error};
use crate::models::FormType;
use crate::models::document::Model as DocumentModel;
use crate::outbound::{NewSubmission, OutboundClient, Submitter, created_submission_id};
use crate::repositories::NewDocument;
use crate::server::AppState;

/// Form post from the portal
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateDocumentRequest {
    pub form_type: FormType,
    /// Signer email; required when `requestSignature` is true
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    /// Pre-filled signing fields, forwarded to the signing platform as given
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub fields: Option<JsonValue>,
    /// Raw form answers, stored with the document
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub data: Option<JsonValue>,
    #[serde(default = "default_request_signature")]
    #[schema(default = true)]
    pub request_signature: bool,
}

fn default_request_signature() -> bool {
    true
}

/// Stored document
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DocumentResponse {
    pub id: String,
    pub form_type: String,
    /// `pending`, `viewed`, `completed`, or a status reported by form processing
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submission_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub form_data: Option<JsonValue>,
    /// RFC 3339 timestamp
    pub created_at: String,
    /// RFC 3339 timestamp
    pub updated_at: String,
}

impl From<DocumentModel> for DocumentResponse {
    fn from(model: DocumentModel) -> Self {
        Self {
            id: model.id,
            form_type: model.form_type,
            status: model.status,
            submission_id: model.submission_id,
            form_data: model.form_data,
            created_at: model.created_at.to_rfc3339(),
            updated_at: model.updated_at.to_rfc3339(),
        }
    }
}

/// Creates a document from a portal form post
#[utoipa::path(
    post,
    path = "/api/documents",
    request_body = CreateDocumentRequest,
    responses(
        (status = 201, description = "Document created", body = DocumentResponse),
        (status = 400, description = "Validation error", body = ApiError),
        (status = 502, description = "Signing platform rejected the submission", body = ApiError)
    ),
    tag = "documents"
)]
pub async fn create_document(
    State(state): State<AppState>,
    payload: Result<Json<CreateDocumentRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<DocumentResponse>), ApiError> {
    let Json(request) = payload?;

    let signer_email = match request
        .email
        .as_deref()
        .map(str::trim)
        .filter(|email| !email.is_empty())
    {
        Some(email) if email.contains('@') => Some(email.to_string()),
        Some(_) => {
            return Err(validation_error(
                "email is not a valid address",
                json!({"email": "invalid"}),
            ));
        }
        None if request.request_signature => {
            return Err(validation_error(
                "email is required when a signature is requested",
                json!({"email": "required"}),
            ));
        }
        None => None,
    };

    let documents = state.documents();
    let mut document = documents
        .create(NewDocument {
            id: Uuid::new_v4().to_string(),
            form_type: request.form_type,
            form_data: request.data,
        })
        .await?;

    if request.request_signature
        && let Some(email) = signer_email
    {
        let template_id = state
            .config
            .docuseal
            .templates
            .for_form_type(request.form_type);

        let mut metadata = Map::new();
        metadata.insert("documentId".to_string(), json!(document.id));
        let submission = NewSubmission {
            submitter: Submitter {
                email,
                name: request.name,
            },
            fields: request.fields.unwrap_or_else(|| json!([])),
            metadata,
        };

        let created = state
            .outbound
            .create_submission(template_id, &submission)
            .await?;

        match created_submission_id(&created) {
            Some(submission_id) => {
                document = documents
                    .link_submission(&document.id, submission_id.as_str())
                    .await?;
            }
            None => warn!(
                document_id = %document.id,
                "Signing platform response carried no submission id; document left unlinked"
            ),
        }
    }

    announce_form_submitted(&state, &document);

    info!(
        document_id = %document.id,
        form_type = %document.form_type,
        submission_id = document.submission_id.as_deref(),
        "Form submission accepted"
    );
    Ok((StatusCode::CREATED, Json(document.into())))
}

/// Notifies the automation platform without holding up the response.
fn announce_form_submitted(state: &AppState, document: &DocumentModel) {
    let outbound: Arc<dyn OutboundClient> = state.outbound.clone();
    let path = state.config.n8n.webhook_paths.form_submitted.clone();
    let payload = json!({
        "documentId": document.id,
        "formType": document.form_type,
        "submissionId": document.submission_id,
        "projectId": state.config.project_id,
    });
    let document_id = document.id.clone();

    tokio::spawn(
        async move {
            if let Err(e) = outbound.send_webhook(&path, &payload).await {
                warn!(document_id = %document_id, error = %e, "Form-submitted webhook failed");
            }
        }
        .in_current_span(),
    );
}

/// Fetches a document by id
#[utoipa::path(
    get,
    path = "/api/documents/{id}",
    params(("id" = String, Path, description = "Document identifier")),
    responses(
        (status = 200, description = "Document", body = DocumentResponse),
        (status = 404, description = "Document not found", body = ApiError)
    ),
    tag = "documents"
)]
pub async fn get_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DocumentResponse>, ApiError> {
    let document = state
        .documents()
        .find_by_id(&id)
        .await?
        .ok_or_else(|| not_found(&format!("Document '{}' not found", id)))?;
    Ok(Json(document.into()))
}
