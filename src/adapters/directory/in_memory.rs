//! In-memory session directory for testing.
//!
//! Records the mirror writes the lifecycle manager performs so tests can
//! assert on them, with failure injection for outage scenarios.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::foundation::{SessionId, Timestamp, UserId};
use crate::domain::session::{LiveSession, Participant};
use crate::ports::{DirectoryError, SessionDirectory};

#[derive(Debug, Clone)]
struct SessionRow {
    ended_at: Option<Timestamp>,
    participants: Vec<UserId>,
}

/// In-memory session directory with failure injection.
pub struct InMemorySessionDirectory {
    rows: RwLock<HashMap<SessionId, SessionRow>>,
    unavailable: AtomicBool,
}

impl InMemorySessionDirectory {
    /// Creates a new empty directory.
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(HashMap::new()),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Makes every subsequent call fail with `Unavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of recorded sessions.
    pub async fn started_count(&self) -> usize {
        self.rows.read().await.len()
    }

    /// End time recorded for a session, if any.
    pub async fn ended_at(&self, session_id: &SessionId) -> Option<Timestamp> {
        self.rows.read().await.get(session_id)?.ended_at
    }

    /// Participants currently recorded for a session.
    pub async fn participants(&self, session_id: &SessionId) -> Vec<UserId> {
        self.rows
            .read()
            .await
            .get(session_id)
            .map(|row| row.participants.clone())
            .unwrap_or_default()
    }

    fn ensure_available(&self) -> Result<(), DirectoryError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(DirectoryError::Unavailable(
                "in-memory directory marked unavailable".to_string(),
            ))
        } else {
            Ok(())
        }
    }
}

impl Default for InMemorySessionDirectory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionDirectory for InMemorySessionDirectory {
    async fn record_started(&self, session: &LiveSession) -> Result<(), DirectoryError> {
        self.ensure_available()?;
        self.rows.write().await.entry(*session.id()).or_insert(SessionRow {
            ended_at: None,
            participants: Vec::new(),
        });
        Ok(())
    }

    async fn record_joined(
        &self,
        session_id: &SessionId,
        participant: &Participant,
    ) -> Result<(), DirectoryError> {
        self.ensure_available()?;
        let mut rows = self.rows.write().await;
        if let Some(row) = rows.get_mut(session_id) {
            if !row.participants.contains(participant.user_id()) {
                row.participants.push(participant.user_id().clone());
            }
        }
        Ok(())
    }

    async fn record_left(
        &self,
        session_id: &SessionId,
        user_id: &UserId,
    ) -> Result<(), DirectoryError> {
        self.ensure_available()?;
        let mut rows = self.rows.write().await;
        if let Some(row) = rows.get_mut(session_id) {
            row.participants.retain(|p| p != user_id);
        }
        Ok(())
    }

    async fn record_ended(
        &self,
        session_id: &SessionId,
        ended_at: &Timestamp,
    ) -> Result<(), DirectoryError> {
        self.ensure_available()?;
        let mut rows = self.rows.write().await;
        if let Some(row) = rows.get_mut(session_id) {
            // Immutable once set, matching the relational adapter.
            if row.ended_at.is_none() {
                row.ended_at = Some(*ended_at);
            }
        }
        Ok(())
    }
}
