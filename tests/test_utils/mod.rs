//! Shared fixtures for integration tests: an in-memory database with the
//! schema applied, document seeding and a config pointing both platforms at
//! mock servers.

#![allow(dead_code)]

use std::sync::Arc;

use anyhow::Result;
use forms_relay::config::AppConfig;
use forms_relay::models::FormType;
use forms_relay::outbound::HttpOutboundClient;
use forms_relay::repositories::{DocumentRepository, NewDocument};
use forms_relay::server::{AppState, create_app};
use migration::{Migrator, MigratorTrait};
use sea_orm::{Database, DatabaseConnection};

/// Sets up an in-memory SQLite database with all migrations applied.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = Database::connect("sqlite::memory:").await?;
    Migrator::up(&db, None).await?;
    Ok(db)
}

pub async fn setup_test_db_arc() -> Result<Arc<DatabaseConnection>> {
    Ok(Arc::new(setup_test_db().await?))
}

/// Inserts a document and moves it to `status` when that is not `pending`.
pub async fn insert_document(
    db: &DatabaseConnection,
    id: &str,
    form_type: FormType,
    status: &str,
) -> Result<()> {
    use forms_relay::repositories::StatusStore;

    let repo = DocumentRepository::new(Arc::new(db.clone()));
    repo.create(NewDocument {
        id: id.to_string(),
        form_type,
        form_data: None,
    })
    .await?;
    if status != "pending" {
        repo.update_status(id, status).await?;
    }
    Ok(())
}

pub async fn document_status(db: &DatabaseConnection, id: &str) -> Result<Option<String>> {
    let repo = DocumentRepository::new(Arc::new(db.clone()));
    Ok(repo.find_by_id(id).await?.map(|document| document.status))
}

/// Default config with both platforms served by the given base URLs.
pub fn test_config(docuseal_url: &str, n8n_url: &str) -> AppConfig {
    let mut config = AppConfig::default();
    config.profile = "test".to_string();
    config.database_url = "sqlite::memory:".to_string();
    config.docuseal.base_url = docuseal_url.to_string();
    config.docuseal.api_key = Some("docuseal-test-key".to_string());
    config.n8n.base_url = n8n_url.to_string();
    config.n8n.api_key = Some("n8n-test-key".to_string());
    config
}

/// Full router over the real HTTP outbound client.
pub fn test_app(config: AppConfig, db: DatabaseConnection) -> Result<axum::Router> {
    let outbound = Arc::new(HttpOutboundClient::new(&config)?);
    Ok(create_app(AppState::new(Arc::new(config), db, outbound)))
}
