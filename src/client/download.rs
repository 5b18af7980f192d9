use super::{describe_transport_error, with_cancel, SendPolicy, SessionClient};
use crate::envelope::ApiResponse;
use bytes::Bytes;
use reqwest::header::{HeaderMap, ACCEPT, CONTENT_DISPOSITION, CONTENT_TYPE};
use tokio_util::sync::CancellationToken;

const DOWNLOAD_FAILURE_MESSAGE: &str = "Download failed";

/// Opaque binary payload such as a contract PDF or signing certificate.
#[derive(Debug, Clone, PartialEq)]
pub struct Blob {
    pub bytes: Bytes,
    pub content_type: Option<String>,
    pub file_name: Option<String>,
}

impl Blob {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

fn header_string(headers: &HeaderMap, name: reqwest::header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Pulls `filename` out of a `Content-Disposition` header value.
fn file_name_from_disposition(value: &str) -> Option<String> {
    value.split(';').map(str::trim).find_map(|part| {
        let (key, raw) = part.split_once('=')?;
        if !key.trim().eq_ignore_ascii_case("filename") {
            return None;
        }
        let name = raw.trim().trim_matches('"');
        (!name.is_empty()).then(|| name.to_string())
    })
}

impl SessionClient {
    /// Fetches a binary body with the usual auth and single retry, skipping JSON parsing.
    pub async fn download(
        &self,
        path: &str,
        cancel: Option<&CancellationToken>,
    ) -> ApiResponse<Blob> {
        let url = self.config.url(path);
        let policy = SendPolicy {
            auth: true,
            allow_retry: true,
            replayable: true,
            expire_session: true,
        };

        let outcome = self
            .dispatch(policy, cancel, |http, token| {
                let mut builder = http.get(&url).header(ACCEPT, "*/*");
                if let Some(token) = token {
                    builder = builder.bearer_auth(token);
                }
                builder
            })
            .await;
        let response = match outcome {
            Ok(response) => response,
            Err(failure) => return failure.into_envelope(),
        };

        let status = response.status().as_u16();
        if !response.status().is_success() {
            tracing::warn!(path, status, "download rejected");
            return ApiResponse::failure(status, DOWNLOAD_FAILURE_MESSAGE);
        }

        let content_type = header_string(response.headers(), CONTENT_TYPE);
        let file_name = header_string(response.headers(), CONTENT_DISPOSITION)
            .as_deref()
            .and_then(file_name_from_disposition);

        match with_cancel(cancel, response.bytes()).await {
            None => ApiResponse::cancelled(),
            Some(Ok(bytes)) => {
                tracing::debug!(path, size = bytes.len(), "download complete");
                ApiResponse::ok(
                    Blob {
                        bytes,
                        content_type,
                        file_name,
                    },
                    status,
                )
            }
            Some(Err(err)) => ApiResponse::transport(describe_transport_error(&err)),
        }
    }
}
