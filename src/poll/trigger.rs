use super::policy::PollOutcome;
use tokio::sync::{mpsc, oneshot};

pub(crate) struct PollRequest {
    pub(crate) respond_to: Option<oneshot::Sender<PollOutcome>>,
}

/// Cloneable handle that forces an immediate poll.
#[derive(Clone)]
pub struct PollTrigger {
    tx: mpsc::UnboundedSender<PollRequest>,
}

impl PollTrigger {
    pub(crate) fn new(tx: mpsc::UnboundedSender<PollRequest>) -> Self {
        Self { tx }
    }

    /// Polls now (also resuming a paused timer) and waits for the outcome.
    /// `None` once the poller has stopped.
    pub async fn poll_now(&self) -> Option<PollOutcome> {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(PollRequest {
                respond_to: Some(tx),
            })
            .ok()?;
        rx.await.ok()
    }

    /// Queues a poll without waiting for it.
    pub fn request_poll(&self) -> bool {
        self.tx.send(PollRequest { respond_to: None }).is_ok()
    }
}
