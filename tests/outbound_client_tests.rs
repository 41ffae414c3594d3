//! Request shapes of the HTTP outbound client against mock platforms.

use forms_relay::events::ExternalId;
use forms_relay::models::Platform;
use forms_relay::outbound::{
    ClientError, HttpOutboundClient, NewSubmission, OutboundClient, Submitter,
    created_submission_id,
};
use serde_json::{Map, json};
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[path = "test_utils/mod.rs"]
mod test_utils;
use test_utils::test_config;

async fn client_for(docuseal: &MockServer, n8n: &MockServer) -> HttpOutboundClient {
    HttpOutboundClient::new(&test_config(&docuseal.uri(), &n8n.uri())).unwrap()
}

#[tokio::test]
async fn get_submission_uses_bearer_auth() {
    let docuseal = MockServer::start().await;
    let n8n = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/submissions/42"))
        .and(header("authorization", "Bearer docuseal-test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 42,
            "template": {"id": 3},
            "metadata": {"documentId": "D1"},
            "status": "completed"
        })))
        .expect(1)
        .mount(&docuseal)
        .await;

    let client = client_for(&docuseal, &n8n).await;
    let submission = client
        .get_submission(&ExternalId::new("42"))
        .await
        .unwrap();

    assert_eq!(submission.id.as_str(), "42");
    assert_eq!(submission.template_id(), Some(ExternalId::new("3")));
    assert_eq!(submission.document_id(), Some(ExternalId::new("D1")));
}

#[tokio::test]
async fn get_submission_surfaces_upstream_status_and_body() {
    let docuseal = MockServer::start().await;
    let n8n = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/submissions/7"))
        .respond_with(ResponseTemplate::new(404).set_body_string("{\"error\":\"Not found\"}"))
        .mount(&docuseal)
        .await;

    let client = client_for(&docuseal, &n8n).await;
    let err = client
        .get_submission(&ExternalId::new("7"))
        .await
        .unwrap_err();

    match err {
        ClientError::Http {
            platform,
            status,
            body,
        } => {
            assert_eq!(platform, Platform::Docuseal);
            assert_eq!(status, 404);
            assert_eq!(body.as_deref(), Some("{\"error\":\"Not found\"}"));
        }
        other => panic!("expected HTTP error, got {other:?}"),
    }
}

#[tokio::test]
async fn get_submission_rejects_non_json_body() {
    let docuseal = MockServer::start().await;
    let n8n = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/submissions/7"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&docuseal)
        .await;

    let client = client_for(&docuseal, &n8n).await;
    let err = client
        .get_submission(&ExternalId::new("7"))
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Decode { .. }));
}

#[tokio::test]
async fn create_submission_posts_submitter_fields_and_metadata() {
    let docuseal = MockServer::start().await;
    let n8n = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/templates/3/submissions"))
        .and(header("authorization", "Bearer docuseal-test-key"))
        .and(body_json(json!({
            "submitter": {"email": "pat@example.com", "name": "Pat Doe"},
            "fields": [{"name": "Quantity", "default_value": "2"}],
            "metadata": {"documentId": "D5"}
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([{"id": 900, "submission_id": 77, "email": "pat@example.com"}])),
        )
        .expect(1)
        .mount(&docuseal)
        .await;

    let mut metadata = Map::new();
    metadata.insert("documentId".to_string(), json!("D5"));
    let client = client_for(&docuseal, &n8n).await;
    let created = client
        .create_submission(
            "3",
            &NewSubmission {
                submitter: Submitter {
                    email: "pat@example.com".to_string(),
                    name: Some("Pat Doe".to_string()),
                },
                fields: json!([{"name": "Quantity", "default_value": "2"}]),
                metadata,
            },
        )
        .await
        .unwrap();

    assert_eq!(created_submission_id(&created), Some(ExternalId::new("77")));
}

#[tokio::test]
async fn trigger_workflow_uses_n8n_api_key() {
    let docuseal = MockServer::start().await;
    let n8n = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/workflows/docuseal-submission-completed"))
        .and(header("x-n8n-api-key", "n8n-test-key"))
        .and(body_json(json!({"submissionId": "42"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"executionId": "e1"})))
        .expect(1)
        .mount(&n8n)
        .await;

    let client = client_for(&docuseal, &n8n).await;
    let response = client
        .trigger_workflow("docuseal-submission-completed", &json!({"submissionId": "42"}))
        .await
        .unwrap();
    assert_eq!(response["executionId"], "e1");
}

#[tokio::test]
async fn trigger_workflow_accepts_empty_body() {
    let docuseal = MockServer::start().await;
    let n8n = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/workflows/wf"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&n8n)
        .await;

    let client = client_for(&docuseal, &n8n).await;
    let response = client.trigger_workflow("wf", &json!({})).await.unwrap();
    assert!(response.is_null());
}

#[tokio::test]
async fn send_webhook_posts_without_auth() {
    let docuseal = MockServer::start().await;
    let n8n = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/webhook/form-submitted"))
        .and(body_json(json!({"documentId": "D1"})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&n8n)
        .await;

    let client = client_for(&docuseal, &n8n).await;
    client
        .send_webhook("/webhook/form-submitted", &json!({"documentId": "D1"}))
        .await
        .unwrap();

    let requests = n8n.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].headers.get("x-n8n-api-key").is_none());
    assert!(requests[0].headers.get("authorization").is_none());
}

#[tokio::test]
async fn send_webhook_keeps_query_string_of_configured_path() {
    let docuseal = MockServer::start().await;
    let n8n = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/webhook/x"))
        .and(query_param("source", "portal"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&n8n)
        .await;

    let mut config = test_config(&docuseal.uri(), &n8n.uri());
    config.n8n.webhook_paths.form_submitted = "/webhook/x?source=portal".to_string();
    let client = HttpOutboundClient::new(&config).unwrap();

    client
        .send_webhook(
            &config.n8n.webhook_paths.form_submitted,
            &json!({"documentId": "D1"}),
        )
        .await
        .unwrap();

    let requests = n8n.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].url.path(), "/webhook/x");
    assert_eq!(requests[0].url.query(), Some("source=portal"));
}

#[tokio::test]
async fn unreachable_platform_is_a_network_error() {
    let n8n = MockServer::start().await;

    // Nothing listens on port 1
    let client = HttpOutboundClient::new(&test_config("http://127.0.0.1:1", &n8n.uri())).unwrap();
    let err = client
        .get_submission(&ExternalId::new("1"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ClientError::Network {
            platform: Platform::Docuseal,
            ..
        }
    ));
}
