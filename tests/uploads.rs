mod common;

use clm_session::{SessionEventKind, UploadFile, UploadForm, UploadProgress, UploadSource};
use common::*;
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const REVIEW_PATH: &str = "/api/v1/review-contracts/";

fn review_form(size: usize) -> UploadForm {
    UploadForm::new()
        .text("title", "Vendor MSA")
        .file(UploadFile::new("file", "msa.pdf", vec![b'x'; size]).with_content_type("application/pdf"))
}

#[tokio::test]
async fn upload_is_replayed_after_refresh() {
    let server = MockServer::start().await;
    mount_refresh(&server, "r1", "a2").await;
    Mock::given(method("POST"))
        .and(path(REVIEW_PATH))
        .and(header("authorization", bearer("a1").as_str()))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(REVIEW_PATH))
        .and(header("authorization", bearer("a2").as_str()))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "rev-1"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, &signed_in("a1", "r1"));
    let response = client.upload_review_document(review_form(1024), None).await;

    assert!(response.success);
    assert_eq!(response.status, 201);
    assert_eq!(response.data.unwrap()["id"], "rev-1");

    let requests = server.received_requests().await.unwrap();
    let replayed = requests
        .iter()
        .filter(|r| r.url.path() == REVIEW_PATH)
        .last()
        .unwrap();
    let body = String::from_utf8_lossy(&replayed.body);
    assert!(body.contains("filename=\"msa.pdf\""));
    assert!(body.contains("Vendor MSA"));
}

fn streamed_form() -> UploadForm {
    let chunks = futures_util::stream::iter(vec![Ok(bytes::Bytes::from_static(b"streamed"))]);
    UploadForm::new().file(UploadFile::new(
        "file",
        "scan.pdf",
        UploadSource::stream(chunks, Some(8)),
    ))
}

#[tokio::test]
async fn streamed_upload_refreshes_but_is_not_replayed() {
    let server = MockServer::start().await;
    mount_refresh(&server, "r1", "a2").await;
    Mock::given(method("POST"))
        .and(path(REVIEW_PATH))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let store = signed_in("a1", "r1");
    let client = client_for(&server, &store);
    let mut events = client.subscribe_events();

    let response = client.upload_review_document(streamed_form(), None).await;
    assert_eq!(response.status, 401);
    assert!(!response.success);
    assert_eq!(store.access_token().as_deref(), Some("a2"));
    assert_eq!(store.refresh_token().as_deref(), Some("r1"));
    assert_eq!(events.try_recv().unwrap().kind, SessionEventKind::TokensRefreshed);
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn streamed_upload_clears_session_when_refresh_fails() {
    let server = MockServer::start().await;
    mount_refresh_rejected(&server).await;
    Mock::given(method("POST"))
        .and(path(REVIEW_PATH))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let store = signed_in("a1", "r1");
    let client = client_for(&server, &store);

    let response = client.upload_review_document(streamed_form(), None).await;
    assert_eq!(response.status, 401);
    assert!(store.access_token().is_none());
}

#[tokio::test]
async fn cancelled_upload_returns_the_cancelled_envelope() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(REVIEW_PATH))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_json(json!({"id": "rev-3"}))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let client = client_for(&server, &signed_in("a1", "r1"));
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let response = client
        .upload_review_document(review_form(1024), Some(&cancel))
        .await;
    assert!(!response.success);
    assert!(response.cancelled);
    assert!(response.error.is_none());
    assert_eq!(response.status, 0);
}

#[tokio::test]
async fn progress_reaches_the_full_file_size() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(REVIEW_PATH))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "rev-2"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, &signed_in("a1", "r1"));
    let seen: Arc<Mutex<Vec<UploadProgress>>> = Arc::default();
    let sink = Arc::clone(&seen);

    let response = client
        .upload_review_document_with_progress(
            review_form(200_000),
            move |p| sink.lock().unwrap().push(p),
            None,
        )
        .await;
    assert!(response.success);

    let seen = seen.lock().unwrap();
    assert!(!seen.is_empty());
    assert!(seen.windows(2).all(|w| w[0].loaded <= w[1].loaded));
    let last = seen.last().unwrap();
    assert_eq!(last.loaded, 200_000);
    assert_eq!(last.total, Some(200_000));
    assert_eq!(last.percent, Some(100.0));
}

#[tokio::test]
async fn progress_upload_does_not_refresh_on_401() {
    let server = MockServer::start().await;
    forbid_refresh(&server).await;
    Mock::given(method("POST"))
        .and(path(REVIEW_PATH))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"detail": "Token expired"})))
        .expect(1)
        .mount(&server)
        .await;

    let store = signed_in("a1", "r1");
    let client = client_for(&server, &store);
    let mut events = client.subscribe_events();

    let response = client
        .upload_review_document_with_progress(review_form(10), |_| {}, None)
        .await;

    assert_eq!(response.status, 401);
    assert_eq!(response.error.as_deref(), Some("Token expired"));
    assert_eq!(store.access_token().as_deref(), Some("a1"));
    assert!(events.try_recv().is_err());
}
