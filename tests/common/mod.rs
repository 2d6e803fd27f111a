use emberroom::{
    db,
    presence::PresenceTracker,
    receipts::ReadReceipts,
    registry::{RoomConfig, RoomKind, RoomRegistry},
    stream::MessageStream,
};
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use tokio::sync::broadcast;
use uuid::Uuid;

pub struct Engine {
    pub pool: SqlitePool,
    pub registry: RoomRegistry,
    pub presence: PresenceTracker,
    pub stream: MessageStream,
    pub receipts: ReadReceipts,
    pub changes: broadcast::Sender<Uuid>,
}

/// Fresh engine over an in-memory sqlite. One connection only: each sqlite
/// `:memory:` connection is its own database.
pub async fn engine() -> Engine {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory sqlite should open");
    db::init(&pool).await.expect("schema init should succeed");

    let changes = broadcast::channel(64).0;
    Engine {
        registry: RoomRegistry::new(pool.clone()),
        presence: PresenceTracker::new(pool.clone()),
        stream: MessageStream::new(pool.clone(), changes.clone()),
        receipts: ReadReceipts::new(pool.clone(), changes.clone()),
        changes,
        pool,
    }
}

pub fn room_config(name: &str) -> RoomConfig {
    RoomConfig {
        name: name.to_owned(),
        kind: RoomKind::Chat,
        duration: "1h".to_owned(),
        is_private: false,
        moderate: false,
        advanced: false,
        ephemeral: false,
        whiteboard: false,
    }
}

pub fn ephemeral_config(name: &str) -> RoomConfig {
    RoomConfig { ephemeral: true, ..room_config(name) }
}
