use super::{decode_json, SendPolicy, SessionClient};
use crate::envelope::ApiResponse;
use bytes::Bytes;
use futures_util::Stream;
use parking_lot::Mutex;
use reqwest::multipart::{Form, Part};
use reqwest::Body;
use serde::de::DeserializeOwned;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio_util::sync::CancellationToken;

const PROGRESS_CHUNK_SIZE: usize = 64 * 1024;

pub type ByteStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send + Sync>>;

/// File contents. In-memory bytes can be replayed after a token refresh; a stream
/// can be sent once.
pub enum UploadSource {
    Bytes(Bytes),
    Stream {
        stream: ByteStream,
        length: Option<u64>,
    },
}

impl UploadSource {
    pub fn stream<S>(stream: S, length: Option<u64>) -> Self
    where
        S: Stream<Item = io::Result<Bytes>> + Send + Sync + 'static,
    {
        UploadSource::Stream {
            stream: Box::pin(stream),
            length,
        }
    }

    /// Byte length, when known up front.
    pub fn len(&self) -> Option<u64> {
        match self {
            UploadSource::Bytes(bytes) => Some(bytes.len() as u64),
            UploadSource::Stream { length, .. } => *length,
        }
    }

    pub fn is_replayable(&self) -> bool {
        matches!(self, UploadSource::Bytes(_))
    }
}

impl std::fmt::Debug for UploadSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UploadSource::Bytes(bytes) => write!(f, "Bytes({} bytes)", bytes.len()),
            UploadSource::Stream { length, .. } => write!(f, "Stream(length: {length:?})"),
        }
    }
}

impl From<Bytes> for UploadSource {
    fn from(bytes: Bytes) -> Self {
        UploadSource::Bytes(bytes)
    }
}

impl From<Vec<u8>> for UploadSource {
    fn from(bytes: Vec<u8>) -> Self {
        UploadSource::Bytes(Bytes::from(bytes))
    }
}

#[derive(Debug)]
pub struct UploadFile {
    pub field_name: String,
    pub file_name: String,
    pub content_type: Option<String>,
    pub source: UploadSource,
}

impl UploadFile {
    pub fn new(
        field_name: impl Into<String>,
        file_name: impl Into<String>,
        source: impl Into<UploadSource>,
    ) -> Self {
        Self {
            field_name: field_name.into(),
            file_name: file_name.into(),
            content_type: None,
            source: source.into(),
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    fn try_clone(&self) -> Option<Self> {
        match &self.source {
            UploadSource::Bytes(bytes) => Some(Self {
                field_name: self.field_name.clone(),
                file_name: self.file_name.clone(),
                content_type: self.content_type.clone(),
                source: UploadSource::Bytes(bytes.clone()),
            }),
            UploadSource::Stream { .. } => None,
        }
    }
}

/// Multipart payload: plain text fields followed by files.
#[derive(Debug, Default)]
pub struct UploadForm {
    pub fields: Vec<(String, String)>,
    pub files: Vec<UploadFile>,
}

impl UploadForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    pub fn file(mut self, file: UploadFile) -> Self {
        self.files.push(file);
        self
    }

    pub fn is_replayable(&self) -> bool {
        self.files.iter().all(|f| f.source.is_replayable())
    }

    /// Sum of file sizes, or `None` if any file has an unknown length.
    pub fn total_len(&self) -> Option<u64> {
        self.files.iter().map(|f| f.source.len()).sum()
    }

    fn try_clone(&self) -> Option<Self> {
        let files = self
            .files
            .iter()
            .map(UploadFile::try_clone)
            .collect::<Option<Vec<_>>>()?;
        Some(Self {
            fields: self.fields.clone(),
            files,
        })
    }

    fn check_content_types(&self) -> Result<(), String> {
        for file in &self.files {
            if let Some(content_type) = &file.content_type {
                if Part::bytes(Vec::new()).mime_str(content_type).is_err() {
                    return Err(format!(
                        "invalid content type {content_type:?} for {}",
                        file.file_name
                    ));
                }
            }
        }
        Ok(())
    }

    fn into_multipart(self, tracker: Option<&Arc<ProgressTracker>>) -> Form {
        let mut form = Form::new();
        for (name, value) in self.fields {
            form = form.text(name, value);
        }
        for file in self.files {
            let part = file_part(file.source, tracker).file_name(file.file_name);
            // Content types were validated before dispatch.
            let part = match &file.content_type {
                Some(content_type) => match part.mime_str(content_type) {
                    Ok(part) => part,
                    Err(_) => continue,
                },
                None => part,
            };
            form = form.part(file.field_name, part);
        }
        form
    }
}

fn file_part(source: UploadSource, tracker: Option<&Arc<ProgressTracker>>) -> Part {
    match (source, tracker) {
        (UploadSource::Bytes(bytes), None) => {
            let len = bytes.len() as u64;
            Part::stream_with_length(Body::from(bytes), len)
        }
        (UploadSource::Bytes(bytes), Some(tracker)) => {
            let len = bytes.len() as u64;
            let stream = ProgressStream::new(Box::pin(chunked(bytes)), Arc::clone(tracker));
            Part::stream_with_length(Body::wrap_stream(stream), len)
        }
        (UploadSource::Stream { stream, length }, tracker) => {
            let body = match tracker {
                Some(tracker) => Body::wrap_stream(ProgressStream::new(stream, Arc::clone(tracker))),
                None => Body::wrap_stream(stream),
            };
            match length {
                Some(len) => Part::stream_with_length(body, len),
                None => Part::stream(body),
            }
        }
    }
}

/// Splits an in-memory payload so progress advances in steps instead of one jump.
fn chunked(bytes: Bytes) -> impl Stream<Item = io::Result<Bytes>> + Send + Sync {
    let chunks: Vec<io::Result<Bytes>> = (0..bytes.len())
        .step_by(PROGRESS_CHUNK_SIZE)
        .map(|start| {
            let end = (start + PROGRESS_CHUNK_SIZE).min(bytes.len());
            Ok(bytes.slice(start..end))
        })
        .collect();
    futures_util::stream::iter(chunks)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UploadProgress {
    pub loaded: u64,
    /// `None` when the length of some file is not known.
    pub total: Option<u64>,
    pub percent: Option<f64>,
}

impl UploadProgress {
    fn new(loaded: u64, total: Option<u64>) -> Self {
        let percent = total.map(|total| {
            if total == 0 {
                100.0
            } else {
                (loaded as f64 / total as f64 * 100.0).min(100.0)
            }
        });
        Self {
            loaded,
            total,
            percent,
        }
    }
}

type ProgressCallback = dyn Fn(UploadProgress) + Send + Sync;

struct ProgressTracker {
    loaded: AtomicU64,
    total: Option<u64>,
    callback: Box<ProgressCallback>,
}

impl ProgressTracker {
    fn advance(&self, n: u64) {
        let loaded = self.loaded.fetch_add(n, Ordering::SeqCst) + n;
        (self.callback)(UploadProgress::new(loaded, self.total));
    }
}

/// Counts bytes as the transport pulls them from the body.
struct ProgressStream {
    inner: ByteStream,
    tracker: Arc<ProgressTracker>,
}

impl ProgressStream {
    fn new(inner: ByteStream, tracker: Arc<ProgressTracker>) -> Self {
        Self { inner, tracker }
    }
}

impl Stream for ProgressStream {
    type Item = io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let poll = self.inner.as_mut().poll_next(cx);
        if let Poll::Ready(Some(Ok(chunk))) = &poll {
            if !chunk.is_empty() {
                self.tracker.advance(chunk.len() as u64);
            }
        }
        poll
    }
}

impl SessionClient {
    /// Multipart upload with the standard single refresh-and-retry on 401.
    ///
    /// Forms holding a streamed file cannot be replayed: a 401 still refreshes the
    /// token, but the upload itself is reported as unauthorized for the caller to
    /// resend. Credentials are only cleared when the refresh fails.
    pub async fn upload<T: DeserializeOwned>(
        &self,
        path: &str,
        form: UploadForm,
        cancel: Option<&CancellationToken>,
    ) -> ApiResponse<T> {
        let policy = SendPolicy {
            auth: true,
            allow_retry: true,
            replayable: form.is_replayable(),
            expire_session: true,
        };
        self.send_multipart(path, form, policy, None, cancel).await
    }

    /// Multipart upload reporting byte progress through `progress`.
    ///
    /// A 401 is returned as-is: no refresh, no retry, credentials untouched.
    pub async fn upload_with_progress<T, P>(
        &self,
        path: &str,
        form: UploadForm,
        progress: P,
        cancel: Option<&CancellationToken>,
    ) -> ApiResponse<T>
    where
        T: DeserializeOwned,
        P: Fn(UploadProgress) + Send + Sync + 'static,
    {
        let tracker = Arc::new(ProgressTracker {
            loaded: AtomicU64::new(0),
            total: form.total_len(),
            callback: Box::new(progress),
        });
        let policy = SendPolicy {
            auth: true,
            allow_retry: false,
            replayable: false,
            expire_session: false,
        };
        self.send_multipart(path, form, policy, Some(tracker), cancel)
            .await
    }

    async fn send_multipart<T: DeserializeOwned>(
        &self,
        path: &str,
        form: UploadForm,
        policy: SendPolicy,
        tracker: Option<Arc<ProgressTracker>>,
        cancel: Option<&CancellationToken>,
    ) -> ApiResponse<T> {
        if let Err(message) = form.check_content_types() {
            return ApiResponse::failure(crate::envelope::TRANSPORT_FAILURE_STATUS, message);
        }

        let url = self.config.url(path);
        tracing::debug!(
            path,
            files = form.files.len(),
            total = ?form.total_len(),
            "uploading multipart form"
        );
        let slot = Mutex::new(Some(form));

        let outcome = self
            .dispatch(policy, cancel, |http, token| {
                let attempt = {
                    let mut guard = slot.lock();
                    match guard.as_ref().and_then(UploadForm::try_clone) {
                        Some(copy) => Some(copy),
                        None => guard.take(),
                    }
                };
                let multipart = attempt
                    .unwrap_or_default()
                    .into_multipart(tracker.as_ref());
                let mut builder = http.post(&url).multipart(multipart);
                if let Some(token) = token {
                    builder = builder.bearer_auth(token);
                }
                builder
            })
            .await;

        match outcome {
            Ok(response) => decode_json(response, cancel, path).await,
            Err(failure) => failure.into_envelope(),
        }
    }
}
