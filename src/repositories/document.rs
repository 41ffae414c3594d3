//! # Document Repository
//!
//! SeaORM operations for the documents table. The repository is also the
//! production [`StatusStore`] used by the webhook event handlers.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use serde_json::Value as JsonValue;
use tracing::{debug, info, warn};

use crate::models::document::{ActiveModel, Column, Entity, Model};
use crate::models::{DocumentStatus, FormType, Transition};

/// Compare-and-set attempts before a status update gives up on a hot row.
const STATUS_UPDATE_ATTEMPTS: usize = 3;

/// Errors raised by document persistence.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("document '{document_id}' not found")]
    NotFound { document_id: String },

    #[error("document '{document_id}' changed concurrently; status update abandoned")]
    Contended { document_id: String },

    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),
}

/// Result of a status update request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusUpdate {
    /// The row now holds the requested status
    Applied { from: String, to: String },
    /// The row already held the requested status
    Unchanged { status: String },
    /// The request would have moved the document backwards and was ignored
    Rejected { current: String, requested: String },
}

/// Persisted document status, as seen by the event handlers.
#[async_trait]
pub trait StatusStore: Send + Sync {
    /// Moves the document to `status`, honouring the monotonic lifecycle.
    async fn update_status(
        &self,
        document_id: &str,
        status: &str,
    ) -> Result<StatusUpdate, StoreError>;
}

/// Fields required to record a new form submission.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub id: String,
    pub form_type: FormType,
    pub form_data: Option<JsonValue>,
}

/// Repository for document database operations
#[derive(Debug, Clone)]
pub struct DocumentRepository {
    db: Arc<DatabaseConnection>,
}

impl DocumentRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Inserts a new document in the `pending` state.
    pub async fn create(&self, document: NewDocument) -> Result<Model, StoreError> {
        let now = Utc::now().fixed_offset();

        let model = ActiveModel {
            id: Set(document.id),
            form_type: Set(document.form_type.as_str().to_string()),
            status: Set(DocumentStatus::Pending.as_str().to_string()),
            submission_id: Set(None),
            form_data: Set(document.form_data),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let created = model.insert(&*self.db).await?;
        info!(
            document_id = %created.id,
            form_type = %created.form_type,
            "Document created"
        );
        Ok(created)
    }

    pub async fn find_by_id(&self, document_id: &str) -> Result<Option<Model>, StoreError> {
        Ok(Entity::find_by_id(document_id.to_string())
            .one(&*self.db)
            .await?)
    }

    /// Records the signing-platform submission a document was sent out as.
    pub async fn link_submission(
        &self,
        document_id: &str,
        submission_id: &str,
    ) -> Result<Model, StoreError> {
        let existing = self
            .find_by_id(document_id)
            .await?
            .ok_or_else(|| StoreError::NotFound {
                document_id: document_id.to_string(),
            })?;

        let mut model: ActiveModel = existing.into();
        model.submission_id = Set(Some(submission_id.to_string()));
        model.updated_at = Set(Utc::now().fixed_offset());

        Ok(model.update(&*self.db).await?)
    }

    /// Writes `status` only if the row still holds `expected`. Returns whether
    /// the row was written.
    pub async fn swap_status(
        &self,
        document_id: &str,
        expected: &str,
        status: &str,
    ) -> Result<bool, StoreError> {
        let result = Entity::update_many()
            .col_expr(Column::Status, Expr::value(status.to_string()))
            .col_expr(Column::UpdatedAt, Expr::value(Utc::now().fixed_offset()))
            .filter(Column::Id.eq(document_id))
            .filter(Column::Status.eq(expected))
            .exec(&*self.db)
            .await?;
        Ok(result.rows_affected > 0)
    }
}

#[async_trait]
impl StatusStore for DocumentRepository {
    async fn update_status(
        &self,
        document_id: &str,
        status: &str,
    ) -> Result<StatusUpdate, StoreError> {
        for attempt in 1..=STATUS_UPDATE_ATTEMPTS {
            let current = self
                .find_by_id(document_id)
                .await?
                .ok_or_else(|| StoreError::NotFound {
                    document_id: document_id.to_string(),
                })?
                .status;

            match Transition::between(&current, status) {
                Transition::Unchanged => {
                    debug!(document_id, status, "Document status already current");
                    return Ok(StatusUpdate::Unchanged { status: current });
                }
                Transition::Regression => {
                    warn!(
                        document_id,
                        current = %current,
                        requested = status,
                        "Ignoring status regression"
                    );
                    return Ok(StatusUpdate::Rejected {
                        current,
                        requested: status.to_string(),
                    });
                }
                Transition::Apply => {}
            }

            if self.swap_status(document_id, &current, status).await? {
                info!(
                    document_id,
                    from = %current,
                    to = status,
                    "Document status updated"
                );
                return Ok(StatusUpdate::Applied {
                    from: current,
                    to: status.to_string(),
                });
            }

            debug!(document_id, attempt, "Document status changed underneath update; retrying");
        }

        Err(StoreError::Contended {
            document_id: document_id.to_string(),
        })
    }
}
