//! Authenticated Server-Sent Events: frame decoding, subscriptions and AI drafting.

mod decoder;
mod generation;
mod subscription;

pub use decoder::{SseFrame, SseFrameDecoder, DEFAULT_EVENT, DEFAULT_MAX_FRAME_LEN};
pub use generation::{Draft, DraftObserver, GenerationEvent, GenerationStream};
pub use subscription::{StreamNotice, StreamObserver, StreamState, StreamSubscription};
