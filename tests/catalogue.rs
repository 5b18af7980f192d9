mod common;

use clm_session::api::{MetadataFieldInput, NotificationInput, WorkflowInput};
use common::*;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn notification_is_created_and_listed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/notifications/"))
        .and(header("authorization", bearer("a1").as_str()))
        .and(body_json(json!({
            "message": "Renewal due",
            "notification_type": "email",
            "subject": "MSA renewal",
            "recipient_id": "u7"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": 12,
            "message": "Renewal due",
            "notification_type": "email",
            "status": "pending"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/notifications/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 12, "message": "Renewal due", "recipient_id": 7}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, &signed_in("a1", "r1"));
    let input = NotificationInput {
        message: "Renewal due".to_string(),
        notification_type: "email".to_string(),
        subject: Some("MSA renewal".to_string()),
        recipient_id: Some("u7".to_string()),
        ..NotificationInput::default()
    };
    let created = client.create_notification(&input).await.data.unwrap();
    assert_eq!(created.id, "12");
    assert_eq!(created.status.as_deref(), Some("pending"));

    let listed = client.list_notifications().await.data.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed.results[0].recipient_id.as_deref(), Some("7"));
}

#[tokio::test]
async fn workflow_is_sent_with_empty_steps() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/workflows/"))
        .and(body_json(json!({"name": "Legal review", "steps": []})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": "wf-1",
            "name": "Legal review",
            "steps": [],
            "is_active": true
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, &signed_in("a1", "r1"));
    let input = WorkflowInput {
        name: "Legal review".to_string(),
        ..WorkflowInput::default()
    };
    let workflow = client.create_workflow(&input).await.data.unwrap();
    assert_eq!(workflow.id, "wf-1");
    assert!(workflow.steps.is_empty());
    assert_eq!(workflow.extra["is_active"], json!(true));
}

#[tokio::test]
async fn workflows_accept_a_paginated_listing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/workflows/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "count": 3,
            "next": "http://localhost/api/v1/workflows/?page=2",
            "results": [{"id": 1, "name": "Approval"}]
        })))
        .mount(&server)
        .await;

    let client = client_for(&server, &signed_in("a1", "r1"));
    let page = client.list_workflows().await.data.unwrap();
    assert_eq!(page.count, Some(3));
    assert!(page.next.is_some());
    assert_eq!(page.results[0].name, "Approval");
}

#[tokio::test]
async fn metadata_field_round_trips() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/metadata/fields/"))
        .and(body_json(json!({
            "name": "governing_law",
            "field_type": "text",
            "description": "Jurisdiction"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": 4,
            "name": "governing_law",
            "field_type": "text"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/metadata/fields/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, &signed_in("a1", "r1"));
    let input = MetadataFieldInput {
        name: "governing_law".to_string(),
        field_type: "text".to_string(),
        description: Some("Jurisdiction".to_string()),
    };
    let field = client.create_metadata_field(&input).await.data.unwrap();
    assert_eq!(field.id, "4");
    assert_eq!(field.field_type.as_deref(), Some("text"));

    let listed = client.list_metadata_fields().await.data.unwrap();
    assert!(listed.is_empty());
}

#[tokio::test]
async fn repository_listings_are_decoded() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/documents/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "d1", "name": "nda.pdf", "file_type": "pdf", "folder_id": 3}
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/repository/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "folders": 2,
            "documents": 5
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/repository/folders/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 3, "name": "Vendors", "parent_id": null}
        ])))
        .mount(&server)
        .await;

    let client = client_for(&server, &signed_in("a1", "r1"));

    let documents = client.list_documents().await.data.unwrap();
    assert_eq!(documents.results[0].title, "nda.pdf");
    assert_eq!(documents.results[0].folder_id.as_deref(), Some("3"));

    let contents = client.repository_contents().await.data.unwrap();
    assert_eq!(contents["documents"], 5);

    let folders = client.list_repository_folders().await.data.unwrap();
    assert_eq!(folders.results[0].id, "3");
    assert!(folders.results[0].parent_id.is_none());
}
