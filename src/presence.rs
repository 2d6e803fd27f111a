use sqlx::SqlitePool;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::EngineResult;

/// Maintains each room's active-user set. Every write here is a merge
/// (single idempotent INSERT/DELETE row ops), never an overwrite of the whole
/// set, so concurrent joiners cannot clobber each other.
#[derive(Clone)]
pub struct PresenceTracker {
    pool: SqlitePool,
}

impl PresenceTracker {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Merge-add. Rejoining refreshes `joined_at`, which restarts the grace
    /// period a user without messages gets before the sweep prunes them.
    pub async fn join(&self, room_id: Uuid, username: &str) -> EngineResult<()> {
        let now = OffsetDateTime::now_utc().unix_timestamp();
        sqlx::query(
            "INSERT INTO room_members (room_id, username, joined_at) VALUES (?,?,?) \
             ON CONFLICT (room_id, username) DO UPDATE SET joined_at = excluded.joined_at",
        )
        .bind(room_id)
        .bind(username)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Explicit leave is unconditional and immediate, unlike the time-based
    /// pruning the sweep does.
    pub async fn leave(&self, room_id: Uuid, username: &str) -> EngineResult<()> {
        sqlx::query("DELETE FROM room_members WHERE room_id = ? AND username = ?")
            .bind(room_id)
            .bind(username)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn active_users(&self, room_id: Uuid) -> EngineResult<Vec<String>> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT username FROM room_members WHERE room_id = ? ORDER BY username")
                .bind(room_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(|(username,)| username).collect())
    }

    /// Removes members whose latest activity predates `now - window`. A
    /// member's activity is their most recent message, or their join time if
    /// they haven't sent one yet. Single statement, so the sweep and live
    /// joins can race without losing a fresh join.
    pub async fn prune(
        &self,
        room_id: Uuid,
        window: Duration,
        now: OffsetDateTime,
    ) -> EngineResult<u64> {
        let cutoff = (now - window).unix_timestamp();
        let result = sqlx::query(
            "DELETE FROM room_members WHERE room_id = ?1 AND joined_at < ?2 \
             AND NOT EXISTS (SELECT 1 FROM messages \
                 WHERE messages.room_id = ?1 \
                 AND messages.username = room_members.username \
                 AND messages.created_at >= ?2)",
        )
        .bind(room_id)
        .bind(cutoff)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
