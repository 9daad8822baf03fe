//! SessionLifecycle - membership bookkeeping and expiry.
//!
//! Sessions move `Created → Active → Expired`. Expiry comes from the
//! teacher ending the session or from the idle-timeout policy, detected by
//! the periodic sweep; per-request checks additionally short-circuit
//! obviously expired sessions.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::sync::watch;
use tokio::time;

use crate::config::SessionPolicyConfig;
use crate::domain::channels;
use crate::domain::foundation::{ClassroomId, SessionId, Timestamp, UserId};
use crate::domain::session::{LiveSession, SessionError};
use crate::ports::{AuthenticatedUser, MessageBus, SessionDirectory, SessionRegistry};

use super::events;

/// Lifecycle policy derived from configuration.
#[derive(Debug, Clone, Copy)]
pub struct SessionPolicy {
    /// Maximum participants per session; `None` means unbounded.
    pub capacity: Option<usize>,
    /// Idle duration after which the sweep expires a session.
    pub idle_timeout: Duration,
}

impl From<&SessionPolicyConfig> for SessionPolicy {
    fn from(config: &SessionPolicyConfig) -> Self {
        Self {
            capacity: config.capacity,
            idle_timeout: config.idle_timeout(),
        }
    }
}

/// Manages session creation, membership, and expiry.
pub struct SessionLifecycle {
    registry: Arc<dyn SessionRegistry>,
    directory: Arc<dyn SessionDirectory>,
    bus: Arc<dyn MessageBus>,
    policy: SessionPolicy,
}

impl SessionLifecycle {
    pub fn new(
        registry: Arc<dyn SessionRegistry>,
        directory: Arc<dyn SessionDirectory>,
        bus: Arc<dyn MessageBus>,
        policy: SessionPolicy,
    ) -> Self {
        Self {
            registry,
            directory,
            bus,
            policy,
        }
    }

    /// Start a session for a classroom. Teacher only.
    ///
    /// The session is recorded in the directory before it becomes joinable;
    /// a session the platform cannot see must not go live.
    ///
    /// # Errors
    ///
    /// - `Forbidden` unless the caller is a teacher
    /// - `Directory` when the relational mirror rejects the write
    pub async fn start(
        &self,
        caller: &AuthenticatedUser,
        classroom_id: ClassroomId,
    ) -> Result<SessionId, SessionError> {
        if !caller.role.is_teacher() {
            return Err(SessionError::Forbidden);
        }

        let session = LiveSession::new(SessionId::new(), caller.user_id.clone(), classroom_id);
        let session_id = *session.id();

        self.directory
            .record_started(&session)
            .await
            .map_err(|e| SessionError::directory(e.to_string()))?;

        self.registry.insert(session).await;

        tracing::info!(
            session_id = %session_id,
            teacher = %caller.user_id,
            classroom = %classroom_id,
            "Session started"
        );

        Ok(session_id)
    }

    /// Join a session with the caller's authenticated identity.
    ///
    /// # Errors
    ///
    /// - `NotFound` / `Expired` / `Full` per the session's current state
    pub async fn join(
        &self,
        session_id: SessionId,
        caller: &AuthenticatedUser,
    ) -> Result<(), SessionError> {
        let handle = self
            .registry
            .get(&session_id)
            .await
            .ok_or(SessionError::NotFound(session_id))?;

        let participant = {
            let now = Timestamp::now();
            let mut session = handle.write().await;
            let newly_joined = session.join(
                caller.user_id.clone(),
                caller.role,
                now,
                self.policy.capacity,
            )?;
            if !newly_joined {
                return Ok(());
            }
            session
                .participant(&caller.user_id)
                .cloned()
                .ok_or(SessionError::unknown_participant(caller.user_id.clone()))?
        };

        // Membership is authoritative in the registry; the mirror is
        // best-effort and must not gate realtime traffic.
        if let Err(e) = self.directory.record_joined(&session_id, &participant).await {
            tracing::warn!(session_id = %session_id, error = %e, "Directory join write failed");
        }

        tracing::debug!(session_id = %session_id, user = %caller.user_id, "Participant joined");
        Ok(())
    }

    /// Leave a session.
    pub async fn leave(
        &self,
        session_id: SessionId,
        user_id: &UserId,
    ) -> Result<(), SessionError> {
        let handle = self
            .registry
            .get(&session_id)
            .await
            .ok_or(SessionError::NotFound(session_id))?;

        let was_present = handle.write().await.leave(user_id);

        if was_present {
            if let Err(e) = self.directory.record_left(&session_id, user_id).await {
                tracing::warn!(session_id = %session_id, error = %e, "Directory leave write failed");
            }
        }

        Ok(())
    }

    /// Record participant activity, feeding the idle-timeout policy.
    pub async fn record_activity(
        &self,
        session_id: SessionId,
        user_id: &UserId,
    ) -> Result<(), SessionError> {
        let handle = self
            .registry
            .get(&session_id)
            .await
            .ok_or(SessionError::NotFound(session_id))?;

        handle.write().await.record_activity(user_id, Timestamp::now());
        Ok(())
    }

    /// End a session now. Teacher only; the end time is immutable.
    ///
    /// # Errors
    ///
    /// - `Forbidden` unless the requester is the session's teacher
    /// - `AlreadyEnded` if an end time was already set
    /// - `Directory` when the mirror rejects the end-time write
    pub async fn end(
        &self,
        session_id: SessionId,
        requester_id: &UserId,
    ) -> Result<(), SessionError> {
        let handle = self
            .registry
            .get(&session_id)
            .await
            .ok_or(SessionError::NotFound(session_id))?;

        let ended_at = {
            let mut session = handle.write().await;
            if session.teacher_id() != requester_id {
                return Err(SessionError::Forbidden);
            }
            let now = Timestamp::now();
            session.end(now)?;
            now
        };

        self.directory
            .record_ended(&session_id, &ended_at)
            .await
            .map_err(|e| SessionError::directory(e.to_string()))?;

        self.announce_ended(&session_id).await;

        tracing::info!(session_id = %session_id, "Session ended by teacher");
        Ok(())
    }

    /// Expire idle sessions and reclaim terminal ones.
    ///
    /// Returns the number of sessions transitioned to expired by this call.
    /// Safe to invoke concurrently and repeatedly: already-expired sessions
    /// are a no-op, and each session's expiry condition is re-checked under
    /// its own lock, so a join racing the sweep is never lost.
    ///
    /// Failures on one session never abort the sweep of the rest.
    pub async fn sweep_expired(&self) -> usize {
        let handles = self.registry.live_handles().await;
        let idle_timeout = self.policy.idle_timeout;

        let outcomes = futures::future::join_all(handles.into_iter().map(
            |(session_id, handle)| async move {
                let now = Timestamp::now();
                let mut session = handle.write().await;
                if session.is_expired(&now) {
                    // Marked on a previous pass (or ended by the teacher);
                    // just reclaim the registry entry.
                    return (session_id, None, true);
                }
                if session.sweep_tick(&now, idle_timeout) {
                    (session_id, session.ended_at().copied(), true)
                } else {
                    (session_id, None, false)
                }
            },
        ))
        .await;

        let mut cleaned = 0;
        for (session_id, transitioned_at, reclaim) in outcomes {
            if let Some(ended_at) = transitioned_at {
                cleaned += 1;
                if let Err(e) = self.directory.record_ended(&session_id, &ended_at).await {
                    tracing::warn!(session_id = %session_id, error = %e, "Directory expiry write failed");
                }
                self.announce_ended(&session_id).await;
                tracing::info!(session_id = %session_id, "Session expired by sweep");
            }
            if reclaim {
                self.registry.remove(&session_id).await;
            }
        }

        cleaned
    }

    async fn announce_ended(&self, session_id: &SessionId) {
        let channel = channels::session_channel(session_id);
        let payload = json!({ "sessionId": session_id });
        if let Err(e) = self.bus.publish(&channel, events::SESSION_ENDED, &payload).await {
            tracing::warn!(session_id = %session_id, error = %e, "Session-ended publish failed");
        }
    }
}

/// Recurring background sweep, independent of request handling.
pub struct SweepService {
    lifecycle: Arc<SessionLifecycle>,
    interval: Duration,
}

impl SweepService {
    pub fn new(lifecycle: Arc<SessionLifecycle>, interval: Duration) -> Self {
        Self {
            lifecycle,
            interval,
        }
    }

    /// Run the sweep loop until shutdown is signalled.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = time::interval(self.interval);

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        tracing::info!("Sweep service shutting down");
                        return;
                    }
                }
                _ = ticker.tick() => {
                    let cleaned = self.lifecycle.sweep_expired().await;
                    if cleaned > 0 {
                        tracing::info!(cleaned, "Expired sessions reclaimed");
                    }
                }
            }
        }
    }
}
