use super::decoder::{SseFrame, SseFrameDecoder, DEFAULT_MAX_FRAME_LEN};
use crate::client::{describe_transport_error, ApiRequest, Failure, SendPolicy, SessionClient};
use crate::error::StreamError;
use futures_util::StreamExt;
use reqwest::header::{HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamState {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

impl StreamState {
    /// No further transitions happen without a new subscription.
    pub fn is_terminal(self) -> bool {
        matches!(self, StreamState::Disconnected | StreamState::Error)
    }
}

/// Receives the lifecycle of one subscription, on the subscription's own task.
///
/// `on_error` can follow `on_ready`. It never fires after [`StreamSubscription::close`].
pub trait StreamObserver: Send + 'static {
    fn on_ready(&mut self) {}

    fn on_event(&mut self, frame: SseFrame);

    fn on_error(&mut self, _error: StreamError) {}
}

/// Channel form of [`StreamObserver`] callbacks.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamNotice {
    Ready,
    Event(SseFrame),
    Error(StreamError),
}

impl StreamObserver for mpsc::UnboundedSender<StreamNotice> {
    fn on_ready(&mut self) {
        let _ = self.send(StreamNotice::Ready);
    }

    fn on_event(&mut self, frame: SseFrame) {
        let _ = self.send(StreamNotice::Event(frame));
    }

    fn on_error(&mut self, error: StreamError) {
        let _ = self.send(StreamNotice::Error(error));
    }
}

/// Handle to a running event stream. Dropping it closes the stream.
pub struct StreamSubscription {
    cancel: CancellationToken,
    state: Arc<watch::Sender<StreamState>>,
}

impl StreamSubscription {
    /// Stops the read loop. Safe to call repeatedly and from any state.
    pub fn close(&self) {
        self.cancel.cancel();
        self.state.send_replace(StreamState::Disconnected);
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn state(&self) -> StreamState {
        *self.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<StreamState> {
        self.state.subscribe()
    }

    /// Waits until the stream ends, fails or is closed.
    pub async fn settled(&self) -> StreamState {
        let mut rx = self.state.subscribe();
        let settled = match rx.wait_for(|state| state.is_terminal()).await {
            Ok(state) => *state,
            Err(_) => self.state(),
        };
        settled
    }
}

impl Drop for StreamSubscription {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Moves to `next` unless the subscription was closed in the meantime.
fn advance(state: &watch::Sender<StreamState>, cancel: &CancellationToken, next: StreamState) -> bool {
    state.send_if_modified(|current| {
        if cancel.is_cancelled() {
            return false;
        }
        *current = next;
        true
    })
}

fn fail<O: StreamObserver>(
    observer: &mut O,
    state: &watch::Sender<StreamState>,
    cancel: &CancellationToken,
    path: &str,
    error: StreamError,
) {
    if advance(state, cancel, StreamState::Error) {
        tracing::warn!(path, error = %error, "event stream failed");
        observer.on_error(error);
    }
}

impl SessionClient {
    /// Opens an authenticated event stream for `request` and feeds frames to `observer`.
    ///
    /// A 401 while connecting gets one refresh and one retry. A 401 that survives it
    /// puts the subscription in [`StreamState::Error`], clears the credentials and
    /// emits `LoggedOut(SessionExpired)`, as for any other request. A cancellation
    /// token on `request` closes the stream as if by `close()`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn open_stream<O: StreamObserver>(&self, request: ApiRequest, observer: O) -> StreamSubscription {
        let cancel = match &request.cancel {
            Some(parent) => parent.child_token(),
            None => CancellationToken::new(),
        };
        let (state, _) = watch::channel(StreamState::Connecting);
        let state = Arc::new(state);

        tokio::spawn(run_stream(
            self.clone(),
            request,
            observer,
            cancel.clone(),
            Arc::clone(&state),
        ));

        StreamSubscription { cancel, state }
    }

    /// `GET` event stream at `path`.
    pub fn subscribe<O: StreamObserver>(&self, path: &str, observer: O) -> StreamSubscription {
        self.open_stream(ApiRequest::get(path), observer)
    }
}

async fn run_stream<O: StreamObserver>(
    client: SessionClient,
    request: ApiRequest,
    observer: O,
    cancel: CancellationToken,
    state: Arc<watch::Sender<StreamState>>,
) {
    read_stream(client, request, observer, cancel.clone(), Arc::clone(&state)).await;

    // Cancelled through the request's token instead of `close()`.
    if cancel.is_cancelled() {
        state.send_if_modified(|current| {
            if current.is_terminal() {
                return false;
            }
            *current = StreamState::Disconnected;
            true
        });
    }
}

async fn read_stream<O: StreamObserver>(
    client: SessionClient,
    request: ApiRequest,
    mut observer: O,
    cancel: CancellationToken,
    state: Arc<watch::Sender<StreamState>>,
) {
    let path = request.path.as_str();
    let url = client.config().url(path);
    let body = request.body.clone().filter(|_| request.carries_body());
    let policy = SendPolicy {
        auth: request.auth,
        allow_retry: request.allow_retry,
        replayable: true,
        expire_session: true,
    };

    tracing::debug!(path, "opening event stream");
    let outcome = client
        .dispatch(policy, Some(&cancel), |http, token| {
            let mut headers = request.headers.clone();
            headers.insert(ACCEPT, HeaderValue::from_static("text/event-stream"));
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

    let response = match outcome {
        Ok(response) => response,
        Err(Failure::Cancelled) => return,
        Err(Failure::Unauthorized(_)) => {
            return fail(&mut observer, &state, &cancel, path, StreamError::Unauthorized);
        }
        Err(Failure::Transport(message)) => {
            return fail(&mut observer, &state, &cancel, path, StreamError::Transport(message));
        }
    };

    let status = response.status();
    if !status.is_success() {
        return fail(&mut observer, &state, &cancel, path, StreamError::Status(status.as_u16()));
    }
    if status == StatusCode::NO_CONTENT {
        return fail(&mut observer, &state, &cancel, path, StreamError::MissingBody);
    }

    if !advance(&state, &cancel, StreamState::Connected) {
        return;
    }
    tracing::info!(path, "event stream connected");
    observer.on_ready();

    let mut decoder = SseFrameDecoder::new();
    let mut bytes = response.bytes_stream();
    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            next = bytes.next() => next,
        };

        match next {
            Some(Ok(chunk)) => {
                for frame in decoder.push(&chunk) {
                    if cancel.is_cancelled() {
                        return;
                    }
                    tracing::debug!(path, event = %frame.event, "event stream frame");
                    observer.on_event(frame);
                }
                if decoder.is_overflowed() {
                    let error = StreamError::FrameTooLarge(DEFAULT_MAX_FRAME_LEN);
                    return fail(&mut observer, &state, &cancel, path, error);
                }
            }
            Some(Err(err)) => {
                let message = describe_transport_error(&err);
                return fail(&mut observer, &state, &cancel, path, StreamError::Read(message));
            }
            None => break,
        }
    }

    for frame in decoder.finish() {
        if cancel.is_cancelled() {
            return;
        }
        observer.on_event(frame);
    }
    if advance(&state, &cancel, StreamState::Disconnected) {
        tracing::debug!(path, "event stream ended");
    }
}
