use sqlx::SqlitePool;
use time::{Duration, OffsetDateTime};
use tokio::sync::broadcast;
use tracing::{debug, error};
use uuid::Uuid;

use crate::{presence::PresenceTracker, EngineResult};

/// Periodic reconciliation: expires dead rooms (cascading their messages)
/// and prunes inactive presence. Each room is handled independently; one
/// room failing is logged and skipped, never aborting the rest of the tick,
/// and the loop itself never exits on error.
pub struct Sweeper {
    pool: SqlitePool,
    presence: PresenceTracker,
    changes: broadcast::Sender<Uuid>,
    interval: std::time::Duration,
    window: Duration,
}

impl Sweeper {
    pub fn new(
        pool: SqlitePool,
        presence: PresenceTracker,
        changes: broadcast::Sender<Uuid>,
        interval: std::time::Duration,
        window: Duration,
    ) -> Self {
        Self { pool, presence, changes, interval, window }
    }

    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.interval);
        loop {
            ticker.tick().await;
            self.sweep_once(OffsetDateTime::now_utc()).await;
        }
    }

    /// One tick: the expiry sweep, then the presence sweep. Public so tests
    /// can drive ticks with a chosen `now`.
    pub async fn sweep_once(&self, now: OffsetDateTime) {
        if let Err(err) = self.expire_rooms(now).await {
            error!("expiry sweep could not list rooms: {err}");
        }
        if let Err(err) = self.prune_presence(now).await {
            error!("presence sweep could not list rooms: {err}");
        }
    }

    async fn expire_rooms(&self, now: OffsetDateTime) -> EngineResult<()> {
        let expired: Vec<(Uuid,)> = sqlx::query_as("SELECT id FROM rooms WHERE expires_at < ?")
            .bind(now.unix_timestamp())
            .fetch_all(&self.pool)
            .await?;

        for (room_id,) in expired {
            if let Err(err) = self.expire_room(room_id).await {
                error!(%room_id, "failed to expire room, retrying next tick: {err}");
            }
        }

        self.mop_up_orphans().await?;
        Ok(())
    }

    /// A write racing the cascade can land its row after the cascade
    /// committed: an append past its expiry check, a mark-read, a join.
    /// Anything whose parent is gone gets deleted here, so one tick later
    /// no message (or receipt, or member) outlives its room.
    async fn mop_up_orphans(&self) -> EngineResult<()> {
        sqlx::query("DELETE FROM messages WHERE room_id NOT IN (SELECT id FROM rooms)")
            .execute(&self.pool)
            .await?;
        sqlx::query(
            "DELETE FROM message_reads WHERE message_id NOT IN (SELECT id FROM messages)",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query("DELETE FROM room_members WHERE room_id NOT IN (SELECT id FROM rooms)")
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Cascade order matters: receipts, messages, members, then the room
    /// itself, all in one transaction so no message outlives its room.
    async fn expire_room(&self, room_id: Uuid) -> EngineResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "DELETE FROM message_reads WHERE message_id IN \
             (SELECT id FROM messages WHERE room_id = ?)",
        )
        .bind(room_id)
        .execute(&mut *tx)
        .await?;
        sqlx::query("DELETE FROM messages WHERE room_id = ?")
            .bind(room_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM room_members WHERE room_id = ?")
            .bind(room_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM rooms WHERE id = ?")
            .bind(room_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        // Wake the room's subscribers so they requery and observe the room
        // gone instead of idling until the client hangs up.
        let _ = self.changes.send(room_id);

        debug!(%room_id, "expired room swept");
        Ok(())
    }

    async fn prune_presence(&self, now: OffsetDateTime) -> EngineResult<()> {
        let live: Vec<(Uuid,)> = sqlx::query_as("SELECT id FROM rooms WHERE expires_at >= ?")
            .bind(now.unix_timestamp())
            .fetch_all(&self.pool)
            .await?;

        for (room_id,) in live {
            match self.presence.prune(room_id, self.window, now).await {
                Ok(0) => {}
                Ok(pruned) => debug!(%room_id, pruned, "inactive users removed"),
                Err(err) => error!(%room_id, "presence prune failed: {err}"),
            }
        }
        Ok(())
    }
}
