//! One typed method per backend endpoint, layered on [`crate::SessionClient`].

mod ai;
mod calendar;
mod contracts;
mod notifications;
mod query;
mod repository;
mod reviews;
mod signing;
mod templates;
pub mod types;
mod workflows;

pub use signing::{SigningUpdate, SigningWatch};
pub use types::*;
