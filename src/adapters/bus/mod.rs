//! Message bus adapters.
//!
//! Two production backends implement the `MessageBus` port; the in-memory
//! bus exists for tests. Which backend runs is decided by configuration in
//! `main.rs`, never inside relay logic.

mod ably;
mod in_memory;
mod pusher;

pub use ably::AblyBus;
pub use in_memory::{InMemoryBus, PublishedMessage};
pub use pusher::PusherBus;

use thiserror::Error;

/// Errors constructing a bus adapter from configuration.
#[derive(Debug, Error)]
pub enum BusConfigError {
    #[error("missing credential: {0}")]
    MissingCredential(&'static str),

    #[error("invalid API key format")]
    InvalidKey,

    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),
}
