//! Automation-platform workflow events.

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use tracing::{debug, info, instrument};

use super::{EventHandler, RelayContext, RelayError, WORKFLOW_COMPLETED, parse_payload};
use crate::events::{FormProcessingResult, WorkflowCompleted};

/// Workflow whose result carries a document status update.
pub const FORM_PROCESSOR_WORKFLOW: &str = "form-submission-processor";

/// `workflow.completed`
///
/// Only results of [`FORM_PROCESSOR_WORKFLOW`] are acted on; the reported
/// status is written as given.
#[derive(Debug, Clone, Copy, Default)]
pub struct WorkflowCompletedHandler;

#[async_trait]
impl EventHandler for WorkflowCompletedHandler {
    #[instrument(skip_all, fields(event = WORKFLOW_COMPLETED))]
    async fn handle(&self, ctx: &RelayContext, data: JsonValue) -> Result<(), RelayError> {
        let event: WorkflowCompleted = parse_payload(WORKFLOW_COMPLETED, data)?;

        if event.workflow_id != FORM_PROCESSOR_WORKFLOW {
            debug!(workflow_id = %event.workflow_id, "Workflow result not tracked");
            return Ok(());
        }

        let result: FormProcessingResult =
            parse_payload(WORKFLOW_COMPLETED, event.result.unwrap_or(JsonValue::Null))?;

        info!(
            execution_id = event.execution_id.as_ref().map(|id| id.as_str()),
            document_id = %result.document_id,
            form_type = result.form_type.as_deref(),
            status = %result.status,
            "Form processing finished"
        );

        ctx.documents
            .update_status(result.document_id.as_str(), &result.status)
            .await?;
        Ok(())
    }
}
