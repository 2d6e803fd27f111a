use serde::Serialize;
use sqlx::{FromRow, SqlitePool};
use time::OffsetDateTime;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::{EngineError, EngineResult};

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Message {
    pub id: Uuid,
    pub room_id: Uuid,
    pub username: String,
    pub content: String,
    pub created_at: i64,
    pub ephemeral: bool,
}

/// Append-only per-room message log. Content reaching `append` has already
/// been through the content filter; the stream does not moderate.
#[derive(Clone)]
pub struct MessageStream {
    pool: SqlitePool,
    changes: broadcast::Sender<Uuid>,
}

impl MessageStream {
    pub fn new(pool: SqlitePool, changes: broadcast::Sender<Uuid>) -> Self {
        Self { pool, changes }
    }

    pub async fn append(
        &self,
        room_id: Uuid,
        username: &str,
        content: &str,
    ) -> EngineResult<Message> {
        let now = OffsetDateTime::now_utc();

        // Recheck expiry against the store at write time; a snapshot taken
        // before a concurrent expiry must not let a message slip in.
        let room: Option<(i64, bool)> =
            sqlx::query_as("SELECT expires_at, ephemeral FROM rooms WHERE id = ?")
                .bind(room_id)
                .fetch_optional(&self.pool)
                .await?;
        let Some((expires_at, ephemeral)) = room else {
            return Err(EngineError::NotFound);
        };
        if now.unix_timestamp() > expires_at {
            return Err(EngineError::Expired);
        }

        let message = Message {
            id: Uuid::now_v7(),
            room_id,
            username: username.to_owned(),
            content: content.to_owned(),
            created_at: now.unix_timestamp(),
            ephemeral,
        };
        sqlx::query(
            "INSERT INTO messages (id, room_id, username, content, created_at, ephemeral) \
             VALUES (?,?,?,?,?,?)",
        )
        .bind(message.id)
        .bind(message.room_id)
        .bind(&message.username)
        .bind(&message.content)
        .bind(message.created_at)
        .bind(message.ephemeral)
        .execute(&self.pool)
        .await?;

        let _ = self.changes.send(room_id);
        Ok(message)
    }

    /// The ordered view `viewer` is allowed to see right now. Visibility is
    /// computed per viewer, never stored: an ephemeral message stays visible
    /// to its author and to anyone who hasn't read it yet.
    pub async fn visible_messages(
        &self,
        room_id: Uuid,
        viewer: &str,
    ) -> EngineResult<Vec<Message>> {
        let messages = sqlx::query_as::<_, Message>(
            "SELECT id, room_id, username, content, created_at, ephemeral FROM messages \
             WHERE room_id = ?1 AND (ephemeral = 0 OR username = ?2 OR NOT EXISTS \
                 (SELECT 1 FROM message_reads \
                  WHERE message_id = messages.id AND username = ?2)) \
             ORDER BY created_at ASC, seq ASC",
        )
        .bind(room_id)
        .bind(viewer)
        .fetch_all(&self.pool)
        .await?;
        Ok(messages)
    }

    /// Most recent message regardless of viewer; room-list previews only.
    pub async fn latest(&self, room_id: Uuid) -> EngineResult<Option<Message>> {
        let message = sqlx::query_as::<_, Message>(
            "SELECT id, room_id, username, content, created_at, ephemeral FROM messages \
             WHERE room_id = ? ORDER BY created_at DESC, seq DESC LIMIT 1",
        )
        .bind(room_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(message)
    }

    /// Standing registration for one viewer's filtered view of one room.
    /// Dropping the subscription cancels it; stored data is unaffected.
    pub fn subscribe(&self, room_id: Uuid, viewer: &str) -> Subscription {
        Subscription {
            stream: self.clone(),
            rx: self.changes.subscribe(),
            room_id,
            viewer: viewer.to_owned(),
        }
    }
}

pub struct Subscription {
    stream: MessageStream,
    rx: broadcast::Receiver<Uuid>,
    room_id: Uuid,
    viewer: String,
}

impl Subscription {
    /// The snapshot as of right now; callers usually want one of these
    /// before waiting on changes.
    pub async fn current(&self) -> EngineResult<Vec<Message>> {
        self.stream.visible_messages(self.room_id, &self.viewer).await
    }

    /// Waits for the next change to this room and returns a fresh snapshot.
    /// `None` means the engine shut down and no more notifications will come.
    pub async fn next_snapshot(&mut self) -> EngineResult<Option<Vec<Message>>> {
        loop {
            match self.rx.recv().await {
                Ok(id) if id == self.room_id => break,
                Ok(_) => continue,
                // Snapshots are self-contained, so a lagged receiver just
                // resyncs with one fresh query.
                Err(broadcast::error::RecvError::Lagged(_)) => break,
                Err(broadcast::error::RecvError::Closed) => return Ok(None),
            }
        }
        let snapshot = self.stream.visible_messages(self.room_id, &self.viewer).await?;
        Ok(Some(snapshot))
    }
}
