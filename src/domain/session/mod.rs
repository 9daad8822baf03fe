//! Session module - live session aggregate and its entities.

mod aggregate;
mod control;
mod errors;
mod participant;

pub use aggregate::{LiveSession, SessionState};
pub use control::ControlState;
pub use errors::SessionError;
pub use participant::Participant;
