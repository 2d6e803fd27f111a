use sqlx::SqlitePool;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::EngineResult;

/// Per-message set of usernames that have read it. Names are only ever
/// merge-added; nothing short of room expiry removes one.
#[derive(Clone)]
pub struct ReadReceipts {
    pool: SqlitePool,
    changes: broadcast::Sender<Uuid>,
}

impl ReadReceipts {
    pub fn new(pool: SqlitePool, changes: broadcast::Sender<Uuid>) -> Self {
        Self { pool, changes }
    }

    /// Idempotent merge-add. The first read by a given user notifies the
    /// room's subscribers so their filtered views refresh; repeats are
    /// no-ops.
    pub async fn mark_read(&self, message_id: Uuid, username: &str) -> EngineResult<()> {
        let result =
            sqlx::query("INSERT OR IGNORE INTO message_reads (message_id, username) VALUES (?,?)")
                .bind(message_id)
                .bind(username)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() > 0 {
            let room: Option<(Uuid,)> =
                sqlx::query_as("SELECT room_id FROM messages WHERE id = ?")
                    .bind(message_id)
                    .fetch_optional(&self.pool)
                    .await?;
            if let Some((room_id,)) = room {
                let _ = self.changes.send(room_id);
            }
        }
        Ok(())
    }

    pub async fn read_by(&self, message_id: Uuid) -> EngineResult<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT username FROM message_reads WHERE message_id = ? ORDER BY username",
        )
        .bind(message_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(username,)| username).collect())
    }
}
