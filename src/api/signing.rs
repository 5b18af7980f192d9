use super::query::segment;
use super::types::{SignatureRequest, SigningStatus};
use crate::client::{Blob, SessionClient};
use crate::envelope::ApiResponse;
use crate::error::StreamError;
use crate::poll::{spawn_fallback_poller, FallbackPoller, PollOutcome, PollTrigger};
use crate::stream::{SseFrame, StreamObserver, StreamState, StreamSubscription};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// One observation of a contract's signing progress, from either source.
#[derive(Debug, Clone, PartialEq)]
pub enum SigningUpdate {
    StreamReady,
    Pushed(SseFrame),
    Polled(SigningStatus),
    StreamFailed(StreamError),
}

struct SigningObserver {
    tx: mpsc::UnboundedSender<SigningUpdate>,
    trigger: PollTrigger,
}

impl StreamObserver for SigningObserver {
    fn on_ready(&mut self) {
        let _ = self.tx.send(SigningUpdate::StreamReady);
    }

    fn on_event(&mut self, frame: SseFrame) {
        let _ = self.tx.send(SigningUpdate::Pushed(frame));
    }

    fn on_error(&mut self, error: StreamError) {
        let _ = self.tx.send(SigningUpdate::StreamFailed(error));
        // Polling is now the only source; catch up right away.
        self.trigger.request_poll();
    }
}

/// Live signing status: an event stream plus the fallback poller behind it.
/// Dropping the watch stops both.
pub struct SigningWatch {
    subscription: StreamSubscription,
    poller: FallbackPoller,
}

impl SigningWatch {
    pub fn stream_state(&self) -> StreamState {
        self.subscription.state()
    }

    pub async fn poll_now(&self) -> Option<PollOutcome> {
        self.poller.poll_now().await
    }

    pub fn stop(&self) {
        self.subscription.close();
        self.poller.stop();
    }
}

impl SessionClient {
    fn firma_path(&self, contract_id: &str, action: &str) -> String {
        self.config()
            .api_path(&format!("firma/contracts/{}/{action}", segment(contract_id)))
    }

    pub async fn send_for_signature(
        &self,
        contract_id: &str,
        request: &SignatureRequest,
    ) -> ApiResponse<Value> {
        self.post(&self.firma_path(contract_id, "send/"), request)
            .await
    }

    pub async fn signing_status(&self, contract_id: &str) -> ApiResponse<SigningStatus> {
        self.get(&self.firma_path(contract_id, "status/")).await
    }

    pub async fn download_signed_certificate(
        &self,
        contract_id: &str,
        cancel: Option<&CancellationToken>,
    ) -> ApiResponse<Blob> {
        self.download(&self.firma_path(contract_id, "certificate/"), cancel)
            .await
    }

    /// Push updates for one contract's signing status.
    pub fn subscribe_signing_status<O: StreamObserver>(
        &self,
        contract_id: &str,
        observer: O,
    ) -> StreamSubscription {
        let path = self
            .config()
            .api_path(&format!("firma/webhooks/stream/{}/", segment(contract_id)));
        self.subscribe(&path, observer)
    }

    /// Pairs the signing stream with a fixed-interval status poll and sends both to `tx`.
    ///
    /// A 401 from the poll pauses the timer; a stream failure triggers an immediate poll.
    pub fn watch_signing_status(
        &self,
        contract_id: &str,
        tx: mpsc::UnboundedSender<SigningUpdate>,
    ) -> SigningWatch {
        let client = self.clone();
        let id = contract_id.to_string();
        let poll_tx = tx.clone();
        let poller = spawn_fallback_poller(self.config().fallback_poll_interval, move || {
            let client = client.clone();
            let id = id.clone();
            let tx = poll_tx.clone();
            async move {
                let response = client.signing_status(&id).await;
                let outcome = PollOutcome::from_status(response.success, response.status);
                if let Some(status) = response.data {
                    let _ = tx.send(SigningUpdate::Polled(status));
                }
                outcome
            }
        });

        tracing::debug!(contract_id, "watching signing status");
        let observer = SigningObserver {
            tx,
            trigger: poller.trigger(),
        };
        let subscription = self.subscribe_signing_status(contract_id, observer);

        SigningWatch {
            subscription,
            poller,
        }
    }
}
