mod common;

use clm_session::{
    ApiRequest, ClientConfig, CredentialPair, CredentialStore, LogoutReason, MemoryCredentialStore,
    SessionClient, SessionEventKind,
};
use common::*;
use serde_json::{json, Value};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn login_persists_tokens_and_later_calls_send_bearer() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login/"))
        .and(body_json(json!({"email": "kim@example.com", "password": "pw"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access": "a1",
            "refresh": "r1",
            "user": {"user_id": 3, "email": "kim@example.com", "tenant_id": "t-1"}
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/auth/me/"))
        .and(header("authorization", bearer("a1").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"user_id": 3, "email": "kim@example.com"})))
        .expect(1)
        .mount(&server)
        .await;

    let store = MemoryCredentialStore::new();
    let client = client_for(&server, &store);
    let mut events = client.subscribe_events();

    let login = client.login("kim@example.com", "pw").await;
    assert!(login.success);
    assert_eq!(login.data.unwrap().user.unwrap().tenant_id.as_deref(), Some("t-1"));
    assert_eq!(store.access_token().as_deref(), Some("a1"));
    assert_eq!(store.refresh_token().as_deref(), Some("r1"));
    assert!(client.is_authenticated());
    assert_eq!(events.try_recv().unwrap().kind, SessionEventKind::LoggedIn);

    let me = client.me().await;
    assert!(me.success);
    assert_eq!(me.data.unwrap().user_id.as_deref(), Some("3"));
}

#[tokio::test]
async fn expired_access_token_is_refreshed_and_the_call_retried() {
    let server = MockServer::start().await;
    mount_refresh(&server, "r1", "a2").await;
    Mock::given(method("GET"))
        .and(path("/api/v1/contracts/c1/"))
        .and(header("authorization", bearer("a1").as_str()))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"detail": "Token expired"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/contracts/c1/"))
        .and(header("authorization", bearer("a2").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "c1", "title": "NDA"})))
        .expect(1)
        .mount(&server)
        .await;

    let store = signed_in("a1", "r1");
    let client = client_for(&server, &store);
    let mut events = client.subscribe_events();

    let response = client.get_contract("c1").await;
    assert!(response.success);
    assert_eq!(response.status, 200);
    assert_eq!(response.data.unwrap().title, "NDA");
    assert_eq!(store.access_token().as_deref(), Some("a2"));
    assert_eq!(store.refresh_token().as_deref(), Some("r1"));
    assert_eq!(events.try_recv().unwrap().kind, SessionEventKind::TokensRefreshed);
}

#[tokio::test]
async fn failed_refresh_clears_credentials_and_announces_logout() {
    let server = MockServer::start().await;
    mount_refresh_rejected(&server).await;
    Mock::given(method("GET"))
        .and(path("/api/v1/contracts/c1/"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"detail": "Token expired"})))
        .expect(1)
        .mount(&server)
        .await;

    let store = signed_in("a1", "r1");
    let client = client_for(&server, &store);
    let mut events = client.subscribe_events();

    let response = client.get_contract("c1").await;
    assert!(!response.success);
    assert_eq!(response.status, 401);
    assert_eq!(response.error.as_deref(), Some("Token expired"));
    assert!(store.load().unwrap().is_none());

    let event = events.try_recv().unwrap();
    assert_eq!(
        event.kind,
        SessionEventKind::LoggedOut {
            reason: LogoutReason::SessionExpired
        }
    );
}

#[tokio::test]
async fn retried_request_is_never_refreshed_twice() {
    let server = MockServer::start().await;
    mount_refresh(&server, "r1", "a2").await;
    Mock::given(method("GET"))
        .and(path("/api/v1/contracts/c1/"))
        .respond_with(ResponseTemplate::new(401))
        .expect(2)
        .mount(&server)
        .await;

    let store = signed_in("a1", "r1");
    let client = client_for(&server, &store);

    let response = client.get_contract("c1").await;
    assert_eq!(response.status, 401);
    assert_eq!(response.error.as_deref(), Some("Unauthorized"));
    assert!(store.load().unwrap().is_none());
}

#[tokio::test]
async fn without_retry_skips_the_refresh() {
    let server = MockServer::start().await;
    forbid_refresh(&server).await;
    Mock::given(method("GET"))
        .and(path("/api/v1/contracts/c1/"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let store = signed_in("a1", "r1");
    let client = client_for(&server, &store);

    let response: clm_session::ApiResponse<Value> = client
        .request(ApiRequest::get("/api/v1/contracts/c1/").without_retry())
        .await;
    assert_eq!(response.status, 401);
    assert!(!client.is_authenticated());
}

#[tokio::test]
async fn each_request_reads_the_latest_stored_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/auth/me/"))
        .and(header("authorization", bearer("rotated").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"email": "kim@example.com"})))
        .expect(1)
        .mount(&server)
        .await;

    let store = signed_in("stale", "r1");
    let client = client_for(&server, &store);
    let other = SessionClient::with_store(ClientConfig::new(server.uri()), store.clone()).unwrap();

    other
        .set_credentials(&CredentialPair::new("rotated", "r2"))
        .unwrap();
    assert!(client.me().await.success);
}

#[tokio::test]
async fn failed_refresh_leaves_tokens_untouched() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(REFRESH_PATH))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(REFRESH_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"refresh": "r2"})))
        .mount(&server)
        .await;

    let store = signed_in("a1", "r1");
    let client = client_for(&server, &store);

    assert!(!client.refresh_access_token().await);
    assert!(!client.refresh_access_token().await);
    assert_eq!(store.access_token().as_deref(), Some("a1"));
    assert_eq!(store.refresh_token().as_deref(), Some("r1"));
}

#[tokio::test]
async fn rotated_refresh_token_is_stored_with_the_access_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(REFRESH_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access": "a2", "refresh": "r2"})))
        .expect(1)
        .mount(&server)
        .await;

    let store = signed_in("a1", "r1");
    let client = client_for(&server, &store);

    assert!(client.refresh_access_token().await);
    assert_eq!(store.access_token().as_deref(), Some("a2"));
    assert_eq!(store.refresh_token().as_deref(), Some("r2"));
}

#[tokio::test]
async fn refresh_without_a_stored_token_makes_no_call() {
    let server = MockServer::start().await;
    forbid_refresh(&server).await;

    let client = client_for(&server, &MemoryCredentialStore::new());
    assert!(!client.refresh_access_token().await);
}

#[tokio::test]
async fn single_flight_refresh_is_shared_by_concurrent_401s() {
    let server = MockServer::start().await;
    mount_refresh(&server, "r1", "a2").await;
    Mock::given(method("GET"))
        .and(path("/api/auth/me/"))
        .and(header("authorization", bearer("a1").as_str()))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/auth/me/"))
        .and(header("authorization", bearer("a2").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"email": "kim@example.com"})))
        .expect(2)
        .mount(&server)
        .await;

    let store = signed_in("a1", "r1");
    let config = ClientConfig::new(server.uri()).with_single_flight_refresh(true);
    let client = SessionClient::with_store(config, store.clone()).unwrap();

    let (first, second) = tokio::join!(client.me(), client.me());
    assert!(first.success);
    assert!(second.success);
}

#[tokio::test]
async fn logout_revokes_and_always_clears() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/logout/"))
        .and(body_json(json!({"refresh": "r1"})))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let store = signed_in("a1", "r1");
    let client = client_for(&server, &store);
    let mut events = client.subscribe_events();

    let response = client.logout().await;
    assert_eq!(response.status, 500);
    assert!(store.load().unwrap().is_none());
    assert_eq!(
        events.try_recv().unwrap().kind,
        SessionEventKind::LoggedOut {
            reason: LogoutReason::UserInitiated
        }
    );
}

#[tokio::test]
async fn register_without_tokens_leaves_session_empty() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/register/"))
        .and(body_json(json!({"email": "kim@example.com", "password": "pw", "full_name": "Kim"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"email": "kim@example.com"})))
        .expect(1)
        .mount(&server)
        .await;

    let store = MemoryCredentialStore::new();
    let client = client_for(&server, &store);
    let response = client
        .register(&clm_session::RegisterRequest {
            email: "kim@example.com".to_string(),
            password: "pw".to_string(),
            full_name: "Kim".to_string(),
        })
        .await;

    assert!(response.success);
    assert_eq!(response.status, 201);
    assert!(!client.is_authenticated());
}
