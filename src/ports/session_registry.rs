//! SessionRegistry port - the injected live-session store.
//!
//! Replaces any ambient global registry: the lifecycle manager receives an
//! implementation of this trait, keyed by session id, and every mutation of
//! one session serializes on that session's own lock.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::foundation::SessionId;
use crate::domain::session::LiveSession;

/// Shared handle to one session's state.
///
/// All mutations to a session go through this lock, which makes
/// join/leave/control/expiry transitions linearizable per session while
/// different sessions proceed without contention.
pub type SessionHandle = Arc<RwLock<LiveSession>>;

/// Keyed store of live sessions.
///
/// Implementations must ensure:
/// - The registry's own lock is held only to resolve handles, never across
///   a session mutation
/// - `live_handles` is a point-in-time snapshot; the sweep re-checks expiry
///   under each session's own lock
#[async_trait]
pub trait SessionRegistry: Send + Sync {
    /// Register a session, returning its handle.
    async fn insert(&self, session: LiveSession) -> SessionHandle;

    /// Resolve the handle for a session, if registered.
    async fn get(&self, id: &SessionId) -> Option<SessionHandle>;

    /// Snapshot of every registered session, for the sweep.
    async fn live_handles(&self) -> Vec<(SessionId, SessionHandle)>;

    /// Drop a terminal session. Returns `true` when it was present.
    async fn remove(&self, id: &SessionId) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    // Compile-time check that trait is object-safe
    #[allow(dead_code)]
    fn assert_object_safe(_: &dyn SessionRegistry) {}
}
