//! Authenticated HTTP session against the CLM backend.
//!
//! Every call reloads credentials from the injected [`CredentialStore`], attaches the
//! bearer token, and on a 401 refreshes the token once and replays the request. All
//! outcomes come back as an [`ApiResponse`].

mod auth;
mod download;
mod events;
mod request;
mod upload;

pub use auth::{AuthTokens, RegisterRequest, UserProfile};
pub use download::Blob;
pub use events::{LogoutReason, SessionEvent, SessionEventKind};
pub use request::ApiRequest;
pub use upload::{ByteStream, UploadFile, UploadForm, UploadProgress, UploadSource};

use crate::config::ClientConfig;
use crate::credentials::{CredentialPair, CredentialStore};
use crate::envelope::{extract_error_message, first_present, parse_body, ApiResponse};
use crate::error::{map_http_status, ClientError};
use crate::redact::redact_secrets;
use events::SessionEvents;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tokio_util::sync::CancellationToken;

const UNAUTHORIZED_MESSAGE: &str = "Unauthorized";

fn build_headers(user_agent: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    if let Ok(value) = HeaderValue::from_str(user_agent) {
        headers.insert(USER_AGENT, value);
    }
    headers
}

/// Runs `fut` unless `cancel` fires first; `None` means the caller cancelled.
pub(crate) async fn with_cancel<F: Future>(
    cancel: Option<&CancellationToken>,
    fut: F,
) -> Option<F::Output> {
    match cancel {
        Some(token) => tokio::select! {
            biased;
            _ = token.cancelled() => None,
            out = fut => Some(out),
        },
        None => Some(fut.await),
    }
}

pub(crate) fn describe_transport_error(err: &reqwest::Error) -> String {
    let mut message = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(inner) = source {
        message.push_str(": ");
        message.push_str(&inner.to_string());
        source = inner.source();
    }
    redact_secrets(&message).into_owned()
}

/// How a single dispatch treats authentication.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SendPolicy {
    pub(crate) auth: bool,
    pub(crate) allow_retry: bool,
    /// The request can be sent again after a refresh. When it cannot, a successful
    /// refresh still keeps the session alive but the 401 is returned as-is.
    pub(crate) replayable: bool,
    /// Clear credentials and announce a logout when a 401 cannot be recovered.
    pub(crate) expire_session: bool,
}

#[derive(Debug)]
pub(crate) enum Failure {
    Unauthorized(String),
    Cancelled,
    Transport(String),
}

impl Failure {
    pub(crate) fn into_envelope<T>(self) -> ApiResponse<T> {
        match self {
            Failure::Unauthorized(message) => ApiResponse::unauthorized(message),
            Failure::Cancelled => ApiResponse::cancelled(),
            Failure::Transport(message) => ApiResponse::transport(message),
        }
    }
}

#[derive(Clone)]
pub struct SessionClient {
    http: reqwest::Client,
    config: Arc<ClientConfig>,
    store: Arc<dyn CredentialStore>,
    events: SessionEvents,
    refresh_gate: Arc<Mutex<()>>,
}

impl SessionClient {
    pub fn new(config: ClientConfig, store: Arc<dyn CredentialStore>) -> Result<Self, ClientError> {
        config.validate()?;
        let http = reqwest::Client::builder()
            .default_headers(build_headers(&config.user_agent))
            .cookie_store(true)
            .build()?;

        Ok(Self {
            http,
            config: Arc::new(config),
            store,
            events: SessionEvents::new(),
            refresh_gate: Arc::new(Mutex::new(())),
        })
    }

    pub fn with_store<S: CredentialStore + 'static>(
        config: ClientConfig,
        store: S,
    ) -> Result<Self, ClientError> {
        Self::new(config, Arc::new(store))
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Login, refresh and logout notifications. A `LoggedOut` event with
    /// `SessionExpired` means the caller should return to a login state.
    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub(crate) fn load_credentials(&self) -> Option<CredentialPair> {
        match self.store.load() {
            Ok(pair) => pair,
            Err(err) => {
                tracing::warn!(error = %err, "failed to load credentials");
                None
            }
        }
    }

    pub(crate) fn current_access_token(&self) -> Option<String> {
        self.load_credentials().map(|pair| pair.access_token)
    }

    pub(crate) fn expire_session(&self) {
        if let Err(err) = self.store.clear() {
            tracing::warn!(error = %err, "failed to clear credentials");
        }
        tracing::warn!("session expired, credentials cleared");
        self.events.emit(SessionEventKind::LoggedOut {
            reason: LogoutReason::SessionExpired,
        });
    }

    /// Sends the request built by `build`, handling the 401 refresh-and-retry step.
    ///
    /// `build` receives the freshest access token (if auth is on) and is invoked once
    /// per attempt, so a replay carries the refreshed bearer and nothing else changes.
    pub(crate) async fn dispatch<F>(
        &self,
        policy: SendPolicy,
        cancel: Option<&CancellationToken>,
        build: F,
    ) -> Result<reqwest::Response, Failure>
    where
        F: Fn(&reqwest::Client, Option<&str>) -> reqwest::RequestBuilder,
    {
        let mut allow_retry = policy.allow_retry;
        let mut refreshed = false;
        loop {
            let token = if policy.auth {
                self.current_access_token()
            } else {
                None
            };

            let response = match with_cancel(cancel, build(&self.http, token.as_deref()).send()).await {
                None => return Err(Failure::Cancelled),
                Some(Err(err)) => {
                    let message = describe_transport_error(&err);
                    tracing::warn!(error = %message, "request did not reach the server");
                    return Err(Failure::Transport(message));
                }
                Some(Ok(response)) => response,
            };

            if response.status() != StatusCode::UNAUTHORIZED {
                return Ok(response);
            }

            if policy.auth && allow_retry {
                allow_retry = false;
                if self.refresh_after_rejection(token.as_deref()).await {
                    if policy.replayable {
                        tracing::debug!(url = %response.url(), "retrying with refreshed token");
                        continue;
                    }
                    tracing::debug!(url = %response.url(), "token refreshed, body cannot be replayed");
                    refreshed = true;
                }
            }

            let message = match with_cancel(cancel, response.text()).await {
                None => return Err(Failure::Cancelled),
                Some(text) => {
                    let body = parse_body(&text.unwrap_or_default());
                    first_present(&body, &["error", "message", "detail"])
                        .map(|m| redact_secrets(&m).into_owned())
                        .unwrap_or_else(|| UNAUTHORIZED_MESSAGE.to_string())
                }
            };

            if policy.expire_session && !refreshed {
                self.expire_session();
            }
            return Err(Failure::Unauthorized(message));
        }
    }

    /// Executes a JSON request and decodes the body into `T`.
    pub async fn request<T: DeserializeOwned>(&self, request: ApiRequest) -> ApiResponse<T> {
        if let Some(err) = &request.body_error {
            return ApiResponse::transport(format!("invalid request body: {err}"));
        }

        let url = self.config.url(&request.path);
        let body = request.body.clone().filter(|_| request.carries_body());
        let policy = SendPolicy {
            auth: request.auth,
            allow_retry: request.allow_retry,
            replayable: true,
            expire_session: true,
        };

        tracing::debug!(method = %request.method, path = %request.path, "dispatching request");

        let outcome = self
            .dispatch(policy, request.cancel.as_ref(), |http, token| {
                let mut headers = request.headers.clone();
                if token.is_some() {
                    headers.remove(AUTHORIZATION);
                }
                let mut builder = http.request(request.method.clone(), &url).headers(headers);
                if let Some(body) = &body {
                    builder = builder
                        .header(CONTENT_TYPE, "application/json")
                        .body(body.clone());
                }
                if let Some(token) = token {
                    builder = builder.bearer_auth(token);
                }
                builder
            })
            .await;

        match outcome {
            Ok(response) => decode_json(response, request.cancel.as_ref(), &request.path).await,
            Err(failure) => failure.into_envelope(),
        }
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> ApiResponse<T> {
        self.request(ApiRequest::get(path)).await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> ApiResponse<T> {
        self.request(ApiRequest::post(path).json(body)).await
    }

    pub async fn put<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> ApiResponse<T> {
        self.request(ApiRequest::put(path).json(body)).await
    }

    pub async fn patch<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> ApiResponse<T> {
        self.request(ApiRequest::patch(path).json(body)).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> ApiResponse<T> {
        self.request(ApiRequest::delete(path)).await
    }
}

pub(crate) async fn decode_json<T: DeserializeOwned>(
    response: reqwest::Response,
    cancel: Option<&CancellationToken>,
    path: &str,
) -> ApiResponse<T> {
    let status = response.status();
    let text = match with_cancel(cancel, response.text()).await {
        None => return ApiResponse::cancelled(),
        Some(Ok(text)) => text,
        Some(Err(err)) if status.is_success() => {
            return ApiResponse::transport(describe_transport_error(&err));
        }
        Some(Err(_)) => String::new(),
    };
    let body = parse_body(&text);

    if !status.is_success() {
        let message = extract_error_message(&body);
        tracing::warn!(
            path,
            status = status.as_u16(),
            class = ?map_http_status(status.as_u16()),
            "request rejected"
        );
        return ApiResponse::failure(status.as_u16(), redact_secrets(&message).into_owned());
    }

    match serde_json::from_value::<T>(body) {
        Ok(data) => ApiResponse::ok(data, status.as_u16()),
        Err(err) => {
            tracing::warn!(path, error = %err, "response body did not match the expected shape");
            ApiResponse::ok_without_data(status.as_u16())
        }
    }
}
