use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Method;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

/// One logical JSON call: method, backend-root path, optional body and flags.
///
/// The body is serialised once when it is attached, so a retry after a token refresh
/// sends exactly the same bytes.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) body: Option<Bytes>,
    pub(crate) body_error: Option<String>,
    pub(crate) headers: HeaderMap,
    pub(crate) auth: bool,
    pub(crate) allow_retry: bool,
    pub(crate) cancel: Option<CancellationToken>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            body_error: None,
            headers: HeaderMap::new(),
            auth: true,
            allow_retry: true,
            cancel: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Attaches a JSON body. Only POST, PUT and PATCH send it.
    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Self {
        match serde_json::to_vec(body) {
            Ok(bytes) => {
                self.body = Some(Bytes::from(bytes));
                self.body_error = None;
            }
            Err(err) => {
                self.body = None;
                self.body_error = Some(err.to_string());
            }
        }
        self
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Skips the bearer token (login, registration and other public endpoints).
    pub fn without_auth(mut self) -> Self {
        self.auth = false;
        self
    }

    /// Disables the refresh-and-retry step on 401.
    pub fn without_retry(mut self) -> Self {
        self.allow_retry = false;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub(crate) fn carries_body(&self) -> bool {
        self.method == Method::POST || self.method == Method::PUT || self.method == Method::PATCH
    }
}
