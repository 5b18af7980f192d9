#![allow(dead_code)]

use clm_session::{ClientConfig, CredentialPair, MemoryCredentialStore, SessionClient};
use serde_json::json;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const REFRESH_PATH: &str = "/api/auth/refresh/";

pub fn signed_in(access: &str, refresh: &str) -> MemoryCredentialStore {
    MemoryCredentialStore::with_pair(CredentialPair::new(access, refresh))
}

pub fn client_for(server: &MockServer, store: &MemoryCredentialStore) -> SessionClient {
    SessionClient::with_store(ClientConfig::new(server.uri()), store.clone()).unwrap()
}

pub fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

pub fn sse(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body, "text/event-stream")
}

/// Refresh endpoint that trades `refresh` for `access`, exactly once.
pub async fn mount_refresh(server: &MockServer, refresh: &str, access: &str) {
    Mock::given(method("POST"))
        .and(path(REFRESH_PATH))
        .and(body_json(json!({"refresh": refresh})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access": access})))
        .expect(1)
        .mount(server)
        .await;
}

pub async fn mount_refresh_rejected(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(REFRESH_PATH))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"detail": "Token is invalid or expired"})),
        )
        .expect(1)
        .mount(server)
        .await;
}

pub async fn forbid_refresh(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(REFRESH_PATH))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(server)
        .await;
}

/// One-shot server that answers the first request with a chunked event stream made
/// of `frames`. The body is never terminated: with `keep_open` the socket stays up,
/// otherwise it is dropped mid-body so the client sees a read failure.
pub async fn serve_raw_sse(frames: &'static [&'static str], keep_open: bool) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            match socket.read(&mut buf).await {
                Ok(0) | Err(_) => return,
                Ok(n) => request.extend_from_slice(&buf[..n]),
            }
        }

        let mut response = String::from(
            "HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\ntransfer-encoding: chunked\r\n\r\n",
        );
        for frame in frames {
            response.push_str(&format!("{:x}\r\n{frame}\r\n", frame.len()));
        }
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.flush().await.unwrap();

        if keep_open {
            tokio::time::sleep(Duration::from_secs(30)).await;
        }
    });

    format!("http://{addr}")
}
