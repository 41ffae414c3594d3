//! # Tests for Handlers
//!
//! Handler-level tests against an in-memory database and a fake outbound
//! client. Router-level behaviour lives in the integration tests.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use migration::{Migrator, MigratorTrait};
use sea_orm::{Database, DatabaseConnection};
use serde_json::json;

use crate::config::AppConfig;
use crate::handlers::documents::{CreateDocumentRequest, create_document, get_document};
use crate::handlers::{health, root};
use crate::models::FormType;
use crate::relay::testing::FakeOutbound;
use crate::server::AppState;

async fn test_state() -> AppState {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    Migrator::up(&db, None).await.unwrap();
    state_with_db(db)
}

fn state_with_db(db: DatabaseConnection) -> AppState {
    let mut config = AppConfig::default();
    config.project_id = "portal-test".to_string();
    config.service_id = "relay-test".to_string();
    AppState::new(Arc::new(config), db, Arc::new(FakeOutbound::default()))
}

fn request(form_type: FormType, email: Option<&str>, sign: bool) -> CreateDocumentRequest {
    CreateDocumentRequest {
        form_type,
        email: email.map(str::to_string),
        name: Some("Pat Doe".to_string()),
        fields: None,
        data: Some(json!({"memberId": "X-100"})),
        request_signature: sign,
    }
}

#[tokio::test]
async fn test_root_reports_configured_deployment() {
    let state = test_state().await;
    let Json(info) = root(State(state)).await;

    assert_eq!(info.service, "forms-relay");
    assert_eq!(info.version, env!("CARGO_PKG_VERSION"));
    assert_eq!(info.project, "portal-test");
    assert_eq!(info.service_id, "relay-test");
}

#[tokio::test]
async fn test_health_ok_with_live_database() {
    let state = test_state().await;
    let Json(body) = health(State(state)).await.unwrap();
    assert_eq!(body.status, "ok");
}

#[tokio::test]
async fn test_health_unavailable_without_database() {
    let state = state_with_db(DatabaseConnection::default());
    let err = health(State(state)).await.unwrap_err();
    assert_eq!(err.status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_create_without_signature_stays_unlinked() {
    let state = test_state().await;

    let (status, Json(document)) = create_document(
        State(state.clone()),
        Ok(Json(request(FormType::Onboarding, None, false))),
    )
    .await
    .unwrap();

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(document.form_type, "onboarding");
    assert_eq!(document.status, "pending");
    assert_eq!(document.submission_id, None);
    assert_eq!(document.form_data, Some(json!({"memberId": "X-100"})));

    let Json(fetched) = get_document(State(state), Path(document.id.clone()))
        .await
        .unwrap();
    assert_eq!(fetched.id, document.id);
}

#[tokio::test]
async fn test_create_with_signature_links_submission() {
    let state = test_state().await;

    let (_, Json(document)) = create_document(
        State(state),
        Ok(Json(request(
            FormType::InsuranceVerification,
            Some("pat@example.com"),
            true,
        ))),
    )
    .await
    .unwrap();

    // FakeOutbound answers create_submission with submission_id 1
    assert_eq!(document.submission_id.as_deref(), Some("1"));
    assert_eq!(document.status, "pending");
}

#[tokio::test]
async fn test_signature_requires_email() {
    let state = test_state().await;

    let err = create_document(
        State(state.clone()),
        Ok(Json(request(FormType::Order, Some("  "), true))),
    )
    .await
    .unwrap_err();
    assert_eq!(err.status, StatusCode::BAD_REQUEST);
    assert_eq!(&*err.code, "VALIDATION_FAILED");

    let err = create_document(
        State(state),
        Ok(Json(request(FormType::Order, Some("not-an-address"), false))),
    )
    .await
    .unwrap_err();
    assert_eq!(err.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_get_unknown_document_is_not_found() {
    let state = test_state().await;
    let err = get_document(State(state), Path("missing".to_string()))
        .await
        .unwrap_err();
    assert_eq!(err.status, StatusCode::NOT_FOUND);
}
