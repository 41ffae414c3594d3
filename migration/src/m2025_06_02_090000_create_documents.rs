//! Migration to create the documents table.
//!
//! One row per submitted portal form. The row is keyed by the internal
//! document identifier and optionally linked to a signing-platform submission.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Documents::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Documents::Id)
                            .text()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Documents::FormType).text().not_null())
                    .col(
                        ColumnDef::new(Documents::Status)
                            .text()
                            .not_null()
                            .default("pending"),
                    )
                    .col(ColumnDef::new(Documents::SubmissionId).text().null())
                    .col(ColumnDef::new(Documents::FormData).json_binary().null())
                    .col(
                        ColumnDef::new(Documents::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Documents::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Submission lookups come from signing-platform callbacks
        manager
            .create_index(
                Index::create()
                    .name("idx_documents_submission_id")
                    .table(Documents::Table)
                    .col(Documents::SubmissionId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Documents::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Documents {
    Table,
    Id,
    FormType,
    Status,
    SubmissionId,
    FormData,
    CreatedAt,
    UpdatedAt,
}
