//! Application layer - the realtime coordination services.
//!
//! Each service holds `Arc<dyn Port>` collaborators and exposes the typed
//! operations the HTTP layer calls:
//!
//! - `SignalRelay` - peer-targeted signaling relay
//! - `WhiteboardSync` / `SnapshotBridge` - snapshot persistence + fan-out
//! - `SessionLifecycle` / `SweepService` - membership and expiry
//! - `ControlHandoff` - spotlight and whiteboard authority

mod control;
mod lifecycle;
mod relay;
mod whiteboard;

pub use control::{ControlError, ControlHandoff};
pub use lifecycle::{SessionLifecycle, SessionPolicy, SweepService};
pub use relay::{RelayError, SignalRelay};
pub use whiteboard::{SnapshotBridge, SyncError, UpdateReceipt, WhiteboardSync};

/// Event names published on session presence channels.
///
/// Consumers treat every event as at-least-once; names are part of the
/// client wire contract.
pub mod events {
    pub const SIGNAL: &str = "signal";
    pub const WHITEBOARD_UPDATED: &str = "whiteboard-updated";
    pub const SPOTLIGHT_CHANGED: &str = "spotlight-changed";
    pub const CONTROLLER_CHANGED: &str = "whiteboard-controller-changed";
    pub const SESSION_ENDED: &str = "session-ended";
}
