use super::decoder::SseFrame;
use super::subscription::{StreamObserver, StreamState, StreamSubscription};
use crate::envelope::first_present;
use crate::error::StreamError;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;

const GENERATION_FAILURE_MESSAGE: &str = "Generation failed";

/// One frame of an AI drafting stream, classified by event name.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationEvent {
    Delta(String),
    Context(Value),
    Citations(Value),
    Done(Value),
    Error(String),
    Other(SseFrame),
}

impl GenerationEvent {
    pub fn from_frame(frame: SseFrame) -> Self {
        let name = frame.event.clone();
        match name.as_str() {
            "delta" => {
                let text = match &frame.data {
                    Value::String(text) => Some(text.clone()),
                    data => data.get("delta").and_then(Value::as_str).map(str::to_string),
                };
                match text {
                    Some(text) => GenerationEvent::Delta(text),
                    None => GenerationEvent::Other(frame),
                }
            }
            "context" => GenerationEvent::Context(frame.data),
            "citations" => GenerationEvent::Citations(frame.data),
            "done" => GenerationEvent::Done(frame.data),
            "error" => {
                let message = match &frame.data {
                    Value::String(text) if !text.trim().is_empty() => text.clone(),
                    data => first_present(data, &["error", "message", "detail"])
                        .unwrap_or_else(|| GENERATION_FAILURE_MESSAGE.to_string()),
                };
                GenerationEvent::Error(message)
            }
            _ => GenerationEvent::Other(frame),
        }
    }
}

/// Everything a drafting stream has produced so far.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Draft {
    pub text: String,
    pub context: Option<Value>,
    pub citations: Option<Value>,
    pub done: Option<Value>,
    pub error: Option<String>,
}

impl Draft {
    pub fn apply(&mut self, event: &GenerationEvent) {
        match event {
            GenerationEvent::Delta(text) => self.text.push_str(text),
            GenerationEvent::Context(value) => self.context = Some(value.clone()),
            GenerationEvent::Citations(value) => self.citations = Some(value.clone()),
            GenerationEvent::Done(value) => self.done = Some(value.clone()),
            GenerationEvent::Error(message) => self.error = Some(message.clone()),
            GenerationEvent::Other(_) => {}
        }
    }

    pub fn is_done(&self) -> bool {
        self.done.is_some()
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

/// Folds frames into a shared [`Draft`] and reports each step to `on_update`.
pub struct DraftObserver<F> {
    draft: Arc<Mutex<Draft>>,
    on_update: F,
}

impl<F> DraftObserver<F>
where
    F: FnMut(&GenerationEvent, &Draft) + Send + 'static,
{
    pub fn new(on_update: F) -> Self {
        Self {
            draft: Arc::new(Mutex::new(Draft::default())),
            on_update,
        }
    }

    pub(crate) fn draft_handle(&self) -> Arc<Mutex<Draft>> {
        Arc::clone(&self.draft)
    }
}

impl<F> StreamObserver for DraftObserver<F>
where
    F: FnMut(&GenerationEvent, &Draft) + Send + 'static,
{
    fn on_event(&mut self, frame: SseFrame) {
        let event = GenerationEvent::from_frame(frame);
        let mut draft = self.draft.lock();
        draft.apply(&event);
        (self.on_update)(&event, &*draft);
    }

    fn on_error(&mut self, error: StreamError) {
        let event = GenerationEvent::Error(error.to_string());
        let mut draft = self.draft.lock();
        if draft.error.is_none() {
            draft.apply(&event);
        }
        (self.on_update)(&event, &*draft);
    }
}

/// A running AI drafting stream.
pub struct GenerationStream {
    subscription: StreamSubscription,
    draft: Arc<Mutex<Draft>>,
}

impl GenerationStream {
    pub(crate) fn new(subscription: StreamSubscription, draft: Arc<Mutex<Draft>>) -> Self {
        Self {
            subscription,
            draft,
        }
    }

    /// Snapshot of the draft accumulated so far.
    pub fn draft(&self) -> Draft {
        self.draft.lock().clone()
    }

    pub fn state(&self) -> StreamState {
        self.subscription.state()
    }

    /// Waits for the stream to end and returns the final draft.
    pub async fn finish(self) -> Draft {
        self.subscription.settled().await;
        self.draft()
    }

    /// Stops generation, keeping the partial draft. No error is recorded.
    pub fn cancel(self) -> Draft {
        self.subscription.close();
        self.draft()
    }
}
