//! Signing-platform submission events.
//!
//! Both events re-fetch the full submission (the webhook only carries its id),
//! forward it to the automation platform and, when the submission was tagged
//! with an internal document id, advance that document's status.

use async_trait::async_trait;
use serde_json::{Value as JsonValue, json};
use tracing::{info, instrument};

use super::{
    EventHandler, RelayContext, RelayError, SUBMISSION_COMPLETED, SUBMISSION_OPENED,
    parse_payload,
};
use crate::events::{Submission, SubmissionEvent};
use crate::models::DocumentStatus;

pub const COMPLETED_WORKFLOW: &str = "docuseal-submission-completed";
pub const OPENED_WORKFLOW: &str = "docuseal-submission-opened";

/// `submission.completed`
#[derive(Debug, Clone, Copy, Default)]
pub struct SubmissionCompletedHandler;

#[async_trait]
impl EventHandler for SubmissionCompletedHandler {
    #[instrument(skip_all, fields(event = SUBMISSION_COMPLETED))]
    async fn handle(&self, ctx: &RelayContext, data: JsonValue) -> Result<(), RelayError> {
        let event: SubmissionEvent = parse_payload(SUBMISSION_COMPLETED, data)?;
        let submission = ctx.outbound.get_submission(&event.id).await?;

        let form_type = submission
            .template_id()
            .map(|template_id| ctx.templates.form_type_for(template_id.as_str()))
            .unwrap_or(super::templates::UNKNOWN_FORM_TYPE);

        info!(submission_id = %event.id, form_type, "Submission completed");

        ctx.outbound
            .trigger_workflow(
                COMPLETED_WORKFLOW,
                &json!({
                    "submissionId": event.id,
                    "formType": form_type,
                    "submission": submission,
                }),
            )
            .await?;

        advance_document(ctx, &submission, DocumentStatus::Completed).await
    }
}

/// `submission.opened`
#[derive(Debug, Clone, Copy, Default)]
pub struct SubmissionOpenedHandler;

#[async_trait]
impl EventHandler for SubmissionOpenedHandler {
    #[instrument(skip_all, fields(event = SUBMISSION_OPENED))]
    async fn handle(&self, ctx: &RelayContext, data: JsonValue) -> Result<(), RelayError> {
        let event: SubmissionEvent = parse_payload(SUBMISSION_OPENED, data)?;
        let submission = ctx.outbound.get_submission(&event.id).await?;

        info!(submission_id = %event.id, "Submission opened");

        ctx.outbound
            .trigger_workflow(
                OPENED_WORKFLOW,
                &json!({
                    "submissionId": event.id,
                    "submission": submission,
                }),
            )
            .await?;

        advance_document(ctx, &submission, DocumentStatus::Viewed).await
    }
}

/// Writes `status` to the submission's document, if it names one.
async fn advance_document(
    ctx: &RelayContext,
    submission: &Submission,
    status: DocumentStatus,
) -> Result<(), RelayError> {
    let Some(document_id) = submission.document_id() else {
        info!(submission_id = %submission.id, "Submission carries no document id; status not tracked");
        return Ok(());
    };

    ctx.documents
        .update_status(document_id.as_str(), status.as_str())
        .await?;
    Ok(())
}
