//! PostgreSQL implementation of the SessionDirectory port.
//!
//! Mirrors session and participant metadata into the relational store
//! owned by the classroom CRUD layer. Only the coordinated fields are
//! touched: ids, start/end times, membership.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::domain::foundation::{SessionId, Timestamp, UserId};
use crate::domain::session::{LiveSession, Participant};
use crate::ports::{DirectoryError, SessionDirectory};

/// PostgreSQL session directory.
#[derive(Clone)]
pub struct PostgresSessionDirectory {
    pool: PgPool,
}

impl PostgresSessionDirectory {
    /// Creates a new PostgresSessionDirectory.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionDirectory for PostgresSessionDirectory {
    async fn record_started(&self, session: &LiveSession) -> Result<(), DirectoryError> {
        sqlx::query(
            r#"
            INSERT INTO live_sessions (id, teacher_id, classroom_id, started_at, ended_at)
            VALUES ($1, $2, $3, $4, NULL)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(session.id().as_uuid())
        .bind(session.teacher_id().as_str())
        .bind(session.classroom_id().as_uuid())
        .bind(session.started_at().as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| DirectoryError::Unavailable(format!("insert session: {}", e)))?;

        Ok(())
    }

    async fn record_joined(
        &self,
        session_id: &SessionId,
        participant: &Participant,
    ) -> Result<(), DirectoryError> {
        sqlx::query(
            r#"
            INSERT INTO live_session_participants
                (session_id, user_id, role, joined_at, last_activity)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (session_id, user_id)
            DO UPDATE SET last_activity = EXCLUDED.last_activity
            "#,
        )
        .bind(session_id.as_uuid())
        .bind(participant.user_id().as_str())
        .bind(participant.role().to_string())
        .bind(participant.joined_at().as_datetime())
        .bind(participant.last_activity().as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| DirectoryError::Unavailable(format!("upsert participant: {}", e)))?;

        Ok(())
    }

    async fn record_left(
        &self,
        session_id: &SessionId,
        user_id: &UserId,
    ) -> Result<(), DirectoryError> {
        sqlx::query(
            r#"
            DELETE FROM live_session_participants
            WHERE session_id = $1 AND user_id = $2
            "#,
        )
        .bind(session_id.as_uuid())
        .bind(user_id.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| DirectoryError::Unavailable(format!("delete participant: {}", e)))?;

        Ok(())
    }

    async fn record_ended(
        &self,
        session_id: &SessionId,
        ended_at: &Timestamp,
    ) -> Result<(), DirectoryError> {
        // End times are immutable: a row that already has one keeps it.
        sqlx::query(
            r#"
            UPDATE live_sessions
            SET ended_at = $2
            WHERE id = $1 AND ended_at IS NULL
            "#,
        )
        .bind(session_id.as_uuid())
        .bind(ended_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| DirectoryError::Unavailable(format!("set ended_at: {}", e)))?;

        Ok(())
    }
}
