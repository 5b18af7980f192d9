//! Fixed-interval polling that backs up an event stream.
//!
//! Push updates are a latency optimisation; the poller keeps callers eventually
//! consistent when a stream stalls without erroring.

mod policy;
mod trigger;

pub use policy::PollOutcome;
pub use trigger::PollTrigger;

use policy::{clamp_interval, next_delay};
use std::future::Future;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use trigger::PollRequest;

/// A running poller. Dropping it stops the timer.
pub struct FallbackPoller {
    trigger: PollTrigger,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl FallbackPoller {
    pub fn trigger(&self) -> PollTrigger {
        self.trigger.clone()
    }

    pub async fn poll_now(&self) -> Option<PollOutcome> {
        self.trigger.poll_now().await
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled() || self.task.is_finished()
    }
}

impl Drop for FallbackPoller {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Runs `poll` immediately and then every `interval` (at least one second).
///
/// The returned [`PollOutcome`] steers the timer: `Pause` stops it until a manual
/// [`PollTrigger::poll_now`], `Slow` stretches the next delay.
pub fn spawn_fallback_poller<F, Fut>(interval: Duration, mut poll: F) -> FallbackPoller
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = PollOutcome> + Send + 'static,
{
    let interval = clamp_interval(interval);
    let (tx, mut rx) = mpsc::unbounded_channel::<PollRequest>();
    let cancel = CancellationToken::new();
    let token = cancel.clone();

    let task = tokio::spawn(async move {
        let mut delay: Option<Duration> = Some(Duration::ZERO);

        loop {
            let request = if let Some(wait) = delay {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    req = rx.recv() => match req {
                        Some(req) => Some(req),
                        None => break,
                    },
                    _ = tokio::time::sleep(wait) => None,
                }
            } else {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    req = rx.recv() => match req {
                        Some(req) => Some(req),
                        None => break,
                    },
                }
            };

            let outcome = tokio::select! {
                biased;
                _ = token.cancelled() => break,
                outcome = poll() => outcome,
            };
            delay = next_delay(interval, outcome);
            if delay.is_none() {
                tracing::debug!("fallback polling paused");
            }

            if let Some(tx) = request.and_then(|req| req.respond_to) {
                let _ = tx.send(outcome);
            }
        }

        tracing::debug!("fallback poller stopped");
    });

    FallbackPoller {
        trigger: PollTrigger::new(tx),
        cancel,
        task,
    }
}
