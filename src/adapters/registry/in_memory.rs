//! In-memory implementation of the SessionRegistry port.
//!
//! The registry map is read-mostly: handle resolution vastly outnumbers
//! insert/remove, so an `RwLock` map of per-session handles lets relays on
//! different sessions proceed without touching each other's locks.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::foundation::SessionId;
use crate::domain::session::LiveSession;
use crate::ports::{SessionHandle, SessionRegistry};

/// Registry of live sessions keyed by session id.
pub struct InMemorySessionRegistry {
    sessions: RwLock<HashMap<SessionId, SessionHandle>>,
}

impl InMemorySessionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Number of registered sessions.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Whether the registry is empty.
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

impl Default for InMemorySessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionRegistry for InMemorySessionRegistry {
    async fn insert(&self, session: LiveSession) -> SessionHandle {
        let id = *session.id();
        let handle: SessionHandle = Arc::new(RwLock::new(session));
        self.sessions.write().await.insert(id, handle.clone());
        handle
    }

    async fn get(&self, id: &SessionId) -> Option<SessionHandle> {
        self.sessions.read().await.get(id).cloned()
    }

    async fn live_handles(&self) -> Vec<(SessionId, SessionHandle)> {
        self.sessions
            .read()
            .await
            .iter()
            .map(|(id, handle)| (*id, handle.clone()))
            .collect()
    }

    async fn remove(&self, id: &SessionId) -> bool {
        self.sessions.write().await.remove(id).is_some()
    }
}
